use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

use crate::domain::{DEFAULT_PAGE_SIZE, IntakeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthStatus {
    Pending,
    Approved,
    Rejected,
}

impl FromStr for AuthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AuthStatus::Pending),
            "approved" => Ok(AuthStatus::Approved),
            "rejected" => Ok(AuthStatus::Rejected),
            other => Err(format!("unknown auth status \"{other}\"")),
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthStatus::Pending => "Pending",
            AuthStatus::Approved => "Approved",
            AuthStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status \"{other}\"")),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Inactive => f.write_str("inactive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Leaside,
    Downtown,
}

impl FromStr for Location {
    type Err = String;

    // The backend stores locations either by name or by their numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leaside" | "1" => Ok(Location::Leaside),
            "downtown" | "2" => Ok(Location::Downtown),
            other => Err(format!("unknown preferred location \"{other}\"")),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Leaside => f.write_str("Leaside"),
            Location::Downtown => f.write_str("Downtown"),
        }
    }
}

/// Who acts as medical director for an account.
///
/// When the account holder is also the director there is no separate
/// director email, the holder's email is used instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorContact {
    AccountHolder { name: String, license: String },
    Separate { name: String, license: String, email: String },
}

impl DirectorContact {
    pub fn name(&self) -> &str {
        match self {
            DirectorContact::AccountHolder { name, .. }
            | DirectorContact::Separate { name, .. } => name,
        }
    }

    pub fn license(&self) -> &str {
        match self {
            DirectorContact::AccountHolder { license, .. }
            | DirectorContact::Separate { license, .. } => license,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            DirectorContact::AccountHolder { .. } => None,
            DirectorContact::Separate { email, .. } => Some(email),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name().trim().is_empty() {
            return Err("medical director name is required".into());
        }
        if self.license().trim().is_empty() {
            return Err("medical director license is required".into());
        }
        if let DirectorContact::Separate { email, .. } = self
            && !email.contains('@')
        {
            return Err(format!("medical director email \"{email}\" is invalid"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub account_id: i64,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub holder_name: String,
    pub holder_email: String,
    pub director: DirectorContact,
    pub auth_status: AuthStatus,
    pub is_account_active: Option<bool>,
    pub account_status: AccountStatus,
    pub preferred_location: Location,
}

impl AccountInfo {
    pub fn director_email(&self) -> &str {
        self.director.email().unwrap_or(&self.holder_email)
    }

    /// Builds an account from named string fields of row `row`.
    pub fn from_fields<'a>(
        row: usize,
        field: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<Self, IntakeError> {
        let malformed = |reason: String| IntakeError::MalformedRecord { row, reason };
        let required = |name: &str| -> Result<&'a str, IntakeError> {
            field(name)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| malformed(format!("{name} is empty")))
        };
        let timestamp = |name: &str| -> Result<DateTime<FixedOffset>, IntakeError> {
            let raw = required(name)?;
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| malformed(format!("{name} \"{raw}\" is not a timestamp: {e}")))
        };

        let account_id = required("accountId")?
            .parse::<i64>()
            .map_err(|e| malformed(format!("accountId: {e}")))?;

        let holder_email = required("accountHolderEmail")?.to_string();
        let director_name = required("medicalDirectorName")?.to_string();
        let director_license = required("medicalDirectorLicense")?.to_string();
        let director_email = field("medicalDirectorEmail")
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let holder_is_director = match field("isAlsoMedicalDirector").map(str::trim) {
            Some("true") => true,
            Some("false") => false,
            _ => director_email.is_none(),
        };
        let director = if holder_is_director {
            DirectorContact::AccountHolder {
                name: director_name,
                license: director_license,
            }
        } else {
            DirectorContact::Separate {
                name: director_name,
                license: director_license,
                email: director_email.unwrap_or_default().to_string(),
            }
        };
        director.validate().map_err(malformed)?;

        let is_account_active = match field("isAccountActive").map(str::trim) {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        Ok(AccountInfo {
            account_id,
            created_at: timestamp("createdAt")?,
            updated_at: timestamp("updatedAt")?,
            holder_name: required("accountHolderName")?.to_string(),
            holder_email,
            director,
            auth_status: required("authStatus")?.parse().map_err(malformed)?,
            is_account_active,
            account_status: required("accountStatus")?.parse().map_err(malformed)?,
            preferred_location: required("preferredLocation")?.parse().map_err(malformed)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationFilter {
    #[default]
    All,
    Leaside,
    Downtown,
}

impl LocationFilter {
    pub const ALL: [LocationFilter; 3] = [
        LocationFilter::All,
        LocationFilter::Leaside,
        LocationFilter::Downtown,
    ];

    pub fn next(self) -> Self {
        match self {
            LocationFilter::All => LocationFilter::Leaside,
            LocationFilter::Leaside => LocationFilter::Downtown,
            LocationFilter::Downtown => LocationFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LocationFilter::All => "All",
            LocationFilter::Leaside => "Leaside",
            LocationFilter::Downtown => "Downtown",
        }
    }

    pub fn matches(self, account: &AccountInfo) -> bool {
        match self {
            LocationFilter::All => true,
            LocationFilter::Leaside => account.preferred_location == Location::Leaside,
            LocationFilter::Downtown => account.preferred_location == Location::Downtown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl AuthStatusFilter {
    pub const ALL: [AuthStatusFilter; 3] = [
        AuthStatusFilter::All,
        AuthStatusFilter::Pending,
        AuthStatusFilter::Completed,
    ];

    pub fn next(self) -> Self {
        match self {
            AuthStatusFilter::All => AuthStatusFilter::Pending,
            AuthStatusFilter::Pending => AuthStatusFilter::Completed,
            AuthStatusFilter::Completed => AuthStatusFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AuthStatusFilter::All => "All",
            AuthStatusFilter::Pending => "Auth Pending",
            AuthStatusFilter::Completed => "Completed",
        }
    }

    pub fn matches(self, account: &AccountInfo) -> bool {
        match self {
            AuthStatusFilter::All => true,
            AuthStatusFilter::Pending => account.auth_status == AuthStatus::Pending,
            AuthStatusFilter::Completed => account.auth_status == AuthStatus::Approved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub preferred_location: LocationFilter,
    pub auth_status: AuthStatusFilter,
    pub page: usize, // 1-based
    pub page_size: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            preferred_location: LocationFilter::All,
            auth_status: AuthStatusFilter::All,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationInfo {
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntakeSummary {
    pub total_intakes: usize,
    pub completed: usize,
    pub auth_pending: usize,
}

#[derive(Debug, Clone)]
pub struct IntakePage {
    pub accounts: Vec<AccountInfo>,
    pub statistics: IntakeSummary,
    pub pagination: PaginationInfo,
}

impl IntakePage {
    pub fn has_more(&self) -> bool {
        self.pagination.page < self.pagination.total_pages
    }
}
