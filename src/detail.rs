use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

use crate::account::{AccountInfo, AuthStatus, DirectorContact};
use crate::columns::DATE_FORMAT;
use crate::domain::IntakeError;

/// Optional columns of the data file holding the full intake profile.
pub const DETAIL_COLUMNS: [&str; 27] = [
    "organizationName",
    "designation",
    "phone",
    "billingAddressLine1",
    "billingAddressLine2",
    "billingCity",
    "billingProvince",
    "billingPostalCode",
    "shippingSameAsBilling",
    "shippingAddressLine1",
    "shippingAddressLine2",
    "shippingCity",
    "shippingProvince",
    "shippingPostalCode",
    "paymentMethod",
    "cardNumberLast4",
    "nameOnCard",
    "cardExpiryMonth",
    "cardExpiryYear",
    "nameToAcknowledge",
    "deliveryInstruction",
    "deliveryMonday",
    "deliveryTuesday",
    "deliveryWednesday",
    "deliveryThursday",
    "deliveryFriday",
    "applicationSubmitted",
];

/// Column holding the application submission timestamp.
pub const SUBMITTED_DATE_COLUMN: &str = "submittedDate";

pub const WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Province {
    Alberta,
    BritishColumbia,
    Manitoba,
    NewBrunswick,
    NewfoundlandAndLabrador,
    NovaScotia,
    Ontario,
    PrinceEdwardIsland,
    Quebec,
    Saskatchewan,
}

impl Province {
    const ALL: [Province; 10] = [
        Province::Alberta,
        Province::BritishColumbia,
        Province::Manitoba,
        Province::NewBrunswick,
        Province::NewfoundlandAndLabrador,
        Province::NovaScotia,
        Province::Ontario,
        Province::PrinceEdwardIsland,
        Province::Quebec,
        Province::Saskatchewan,
    ];

    fn key(self) -> &'static str {
        match self {
            Province::Alberta => "alberta",
            Province::BritishColumbia => "british_columbia",
            Province::Manitoba => "manitoba",
            Province::NewBrunswick => "new_brunswick",
            Province::NewfoundlandAndLabrador => "newfoundland_and_labrador",
            Province::NovaScotia => "nova_scotia",
            Province::Ontario => "ontario",
            Province::PrinceEdwardIsland => "prince_edward_island",
            Province::Quebec => "quebec",
            Province::Saskatchewan => "saskatchewan",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Province::Alberta => "Alberta",
            Province::BritishColumbia => "British Columbia",
            Province::Manitoba => "Manitoba",
            Province::NewBrunswick => "New Brunswick",
            Province::NewfoundlandAndLabrador => "Newfoundland and Labrador",
            Province::NovaScotia => "Nova Scotia",
            Province::Ontario => "Ontario",
            Province::PrinceEdwardIsland => "Prince Edward Island",
            Province::Quebec => "Quebec",
            Province::Saskatchewan => "Saskatchewan",
        }
    }
}

impl FromStr for Province {
    type Err = String;

    /// Accepts the stored key (`british_columbia`) or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Province::ALL
            .into_iter()
            .find(|p| p.key() == s || p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown province \"{s}\""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub province: Option<Province>,
    pub postal_code: Option<String>,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            Some(self.line1.as_str()),
            self.line2.as_deref(),
            self.city.as_deref(),
            self.province.map(Province::name),
            self.postal_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Visa,
    MasterCard,
    Amex,
    BankTransfer,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visa" => Ok(PaymentMethod::Visa),
            "mastercard" => Ok(PaymentMethod::MasterCard),
            "amex" => Ok(PaymentMethod::Amex),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            _ => Err(format!("unknown payment method \"{s}\"")),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Visa => "VISA",
            PaymentMethod::MasterCard => "Master Card",
            PaymentMethod::Amex => "American Express",
            PaymentMethod::BankTransfer => "E-Transfer",
        };
        write!(f, "{label}")
    }
}

/// Payment details. Only the last four card digits are ever held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub card_last4: Option<String>,
    pub name_on_card: Option<String>,
    pub expiry_month: Option<String>,
    pub expiry_year: Option<String>,
}

impl PaymentInfo {
    pub fn masked_card(&self) -> String {
        format!(
            "**** **** **** {}",
            self.card_last4.as_deref().unwrap_or("----")
        )
    }

    /// `MM/YY`, or `None` without an expiry month.
    pub fn expiry(&self) -> Option<String> {
        let month = self.expiry_month.as_deref()?;
        let year = match self.expiry_year.as_deref() {
            Some(year) if year.len() >= 2 => &year[year.len() - 2..],
            _ => "--",
        };
        Some(format!("{month:0>2}/{year}"))
    }
}

/// Full intake profile of an account, shown in the detail view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountDetail {
    pub organization: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub billing: Option<Address>,
    pub shipping: Option<Address>,
    pub shipping_same_as_billing: Option<bool>,
    pub payment: Option<PaymentInfo>,
    pub acknowledged_by: Option<String>,
    pub delivery_instruction: Option<String>,
    pub delivery_hours: Vec<(&'static str, String)>,
    pub application_submitted: Option<bool>,
    pub submitted_at: Option<DateTime<FixedOffset>>,
}

impl AccountDetail {
    /// Address goods are shipped to, falling back to billing when flagged.
    pub fn shipping_address(&self) -> Option<&Address> {
        match (&self.shipping, self.shipping_same_as_billing) {
            (Some(address), _) => Some(address),
            (None, Some(true)) => self.billing.as_ref(),
            (None, _) => None,
        }
    }

    /// Builds the profile from named string fields of row `row`. Every field
    /// is optional, unparseable values are reported as malformed.
    pub fn from_fields<'a>(
        row: usize,
        field: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<Self, IntakeError> {
        let malformed = |reason: String| IntakeError::MalformedRecord { row, reason };
        let text = |name: &str| -> Option<String> {
            field(name)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let flag = |name: &str| -> Result<Option<bool>, IntakeError> {
            match text(name).as_deref() {
                None => Ok(None),
                Some("true") => Ok(Some(true)),
                Some("false") => Ok(Some(false)),
                Some(other) => Err(malformed(format!("{name} \"{other}\" is not a flag"))),
            }
        };
        let address = |prefix: &str| -> Result<Option<Address>, IntakeError> {
            let Some(line1) = text(&format!("{prefix}AddressLine1")) else {
                return Ok(None);
            };
            let province = text(&format!("{prefix}Province"))
                .map(|p| p.parse::<Province>())
                .transpose()
                .map_err(malformed)?;
            Ok(Some(Address {
                line1,
                line2: text(&format!("{prefix}AddressLine2")),
                city: text(&format!("{prefix}City")),
                province,
                postal_code: text(&format!("{prefix}PostalCode")),
            }))
        };

        let payment = text("paymentMethod")
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()
            .map_err(malformed)?
            .map(|method| PaymentInfo {
                method,
                card_last4: text("cardNumberLast4"),
                name_on_card: text("nameOnCard"),
                expiry_month: text("cardExpiryMonth"),
                expiry_year: text("cardExpiryYear"),
            });

        let submitted_at = text(SUBMITTED_DATE_COLUMN)
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                    malformed(format!("{SUBMITTED_DATE_COLUMN} \"{raw}\" is not a timestamp: {e}"))
                })
            })
            .transpose()?;

        let delivery_hours = WEEKDAYS
            .iter()
            .filter_map(|&day| text(&format!("delivery{day}")).map(|hours| (day, hours)))
            .collect();

        Ok(AccountDetail {
            organization: text("organizationName"),
            designation: text("designation"),
            phone: text("phone"),
            billing: address("billing")?,
            shipping: address("shipping")?,
            shipping_same_as_billing: flag("shippingSameAsBilling")?,
            payment,
            acknowledged_by: text("nameToAcknowledge"),
            delivery_instruction: text("deliveryInstruction"),
            delivery_hours,
            application_submitted: flag("applicationSubmitted")?,
            submitted_at,
        })
    }
}

/// Placeholder for values an intake does not provide.
pub const MISSING: &str = "—";

const SUBMISSION_DATE_FORMAT: &str = "%d %b %y";

/// A titled group of label/value pairs in the detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailSection {
    pub title: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

fn or_missing(value: Option<impl ToString>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

/// Header line of the detail view: submission date and authorization state.
pub fn submission_summary(account: &AccountInfo, detail: &AccountDetail) -> String {
    let submitted = detail.submitted_at.unwrap_or(account.created_at);
    let completed = match detail.application_submitted {
        Some(submitted) => submitted,
        None => account.auth_status == AuthStatus::Approved,
    };
    format!(
        "Application Submission Date : {} | {}",
        submitted.format(SUBMISSION_DATE_FORMAT),
        if completed {
            "Auth Completed"
        } else {
            "Auth Pending"
        }
    )
}

pub fn detail_sections(account: &AccountInfo, detail: &AccountDetail) -> Vec<DetailSection> {
    let single_person = match &account.director {
        DirectorContact::AccountHolder { .. } => "Yes",
        DirectorContact::Separate { .. } => "No",
    };
    let director_email = match account.director.email() {
        Some(email) => email.to_string(),
        None => format!("{} (account holder)", account.holder_email),
    };
    let active = match account.is_account_active {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };

    let mut payment = vec![(
        "Payment Method",
        or_missing(detail.payment.as_ref().map(|p| p.method)),
    )];
    if let Some(info) = detail
        .payment
        .as_ref()
        .filter(|p| p.method != PaymentMethod::BankTransfer)
    {
        payment.push(("Card Number", info.masked_card()));
        payment.push(("Card Holder Name", or_missing(info.name_on_card.as_ref())));
        payment.push(("Expiry Date", or_missing(info.expiry())));
    }

    let mut delivery = vec![(
        "Instructions",
        or_missing(detail.delivery_instruction.as_ref()),
    )];
    delivery.extend(WEEKDAYS.iter().map(|&day| {
        let hours = detail
            .delivery_hours
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, hours)| hours);
        (day, or_missing(hours))
    }));

    vec![
        DetailSection {
            title: "Account Information",
            fields: vec![
                ("Account Holder", account.holder_name.clone()),
                ("License", or_missing(detail.designation.as_ref())),
                ("Clinic / Organization", or_missing(detail.organization.as_ref())),
                ("Billing Address", or_missing(detail.billing.as_ref())),
                ("Shipping Address", or_missing(detail.shipping_address())),
                ("Phone", or_missing(detail.phone.as_ref())),
                ("Email Address", account.holder_email.clone()),
            ],
        },
        DetailSection {
            title: "Payment Information",
            fields: payment,
        },
        DetailSection {
            title: "Acknowledgements",
            fields: vec![
                (
                    "Financial Responsibility",
                    or_missing(detail.acknowledged_by.as_ref()),
                ),
                ("Terms Acknowledgement", account.holder_name.clone()),
            ],
        },
        DetailSection {
            title: "Medical Director Information",
            fields: vec![
                ("Director Name", account.director.name().to_string()),
                ("License", account.director.license().to_string()),
                ("Single Person Application", single_person.to_string()),
                ("Medical Director's Email", director_email),
            ],
        },
        DetailSection {
            title: "Delivery Hours",
            fields: delivery,
        },
        DetailSection {
            title: "Account",
            fields: vec![
                ("Account ID", account.account_id.to_string()),
                ("Created", account.created_at.format(DATE_FORMAT).to_string()),
                ("Updated", account.updated_at.format(DATE_FORMAT).to_string()),
                ("Auth Status", account.auth_status.to_string()),
                ("Account Status", account.account_status.to_string()),
                ("Active", active.to_string()),
                ("Preferred Location", account.preferred_location.to_string()),
            ],
        },
    ]
}
