use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::account::{
    AccountInfo, AuthStatus, IntakePage, IntakeSummary, PaginationInfo, QueryParams,
};
use crate::detail::{AccountDetail, DETAIL_COLUMNS, SUBMITTED_DATE_COLUMN};
use crate::domain::IntakeError;

const REQUIRED_COLUMNS: [&str; 10] = [
    "accountId",
    "createdAt",
    "updatedAt",
    "accountHolderName",
    "accountHolderEmail",
    "medicalDirectorName",
    "medicalDirectorLicense",
    "authStatus",
    "accountStatus",
    "preferredLocation",
];

const OPTIONAL_COLUMNS: [&str; 3] = [
    "medicalDirectorEmail",
    "isAlsoMedicalDirector",
    "isAccountActive",
];

type LoadedColumn = Option<(&'static str, Vec<Option<String>>)>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Paginated, filterable collection of intake accounts read from a data file.
pub struct IntakeSource {
    name: String,
    accounts: Vec<AccountInfo>,
    details: HashMap<i64, AccountDetail>,
}

impl IntakeSource {
    pub fn open(path: PathBuf) -> Result<Self, IntakeError> {
        let file_info = Self::get_file_info(path)?;
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        // Every column is converted to strings in its own task
        let wanted: Vec<(&'static str, bool)> = REQUIRED_COLUMNS
            .iter()
            .map(|&c| (c, true))
            .chain(OPTIONAL_COLUMNS.iter().map(|&c| (c, false)))
            .chain(DETAIL_COLUMNS.iter().map(|&c| (c, false)))
            .chain(std::iter::once((SUBMITTED_DATE_COLUMN, false)))
            .collect();
        let loaded: Result<Vec<LoadedColumn>, IntakeError> = wanted
            .par_iter()
            .map(|&(name, required)| -> Result<LoadedColumn, IntakeError> {
                if present.iter().any(|p| p == name) {
                    Ok(Some((name, Self::load_column(&df, name)?)))
                } else if required {
                    Err(IntakeError::MissingColumn(name.to_string()))
                } else {
                    Ok(None)
                }
            })
            .collect();
        let columns: HashMap<&'static str, Vec<Option<String>>> =
            loaded?.into_iter().flatten().collect();

        let records = (0..df.height())
            .into_par_iter()
            .map(|row| -> Result<(AccountInfo, AccountDetail), IntakeError> {
                let field = |name: &str| columns.get(name).and_then(|c| c[row].as_deref());
                Ok((
                    AccountInfo::from_fields(row + 1, field)?,
                    AccountDetail::from_fields(row + 1, field)?,
                ))
            })
            .collect::<Result<Vec<_>, IntakeError>>()?;
        let details = records
            .iter()
            .map(|(account, detail)| (account.account_id, detail.clone()))
            .collect();
        let accounts: Vec<AccountInfo> = records.into_iter().map(|(account, _)| account).collect();

        info!(
            "Loaded {} accounts from {:?} ({} bytes, {:?}) in {}ms",
            accounts.len(),
            file_info.path,
            file_info.file_size,
            file_info.file_type,
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(Self {
            name,
            accounts,
            details,
        })
    }

    #[cfg(test)]
    pub fn from_accounts(name: impl Into<String>, accounts: Vec<AccountInfo>) -> Self {
        Self {
            name: name.into(),
            accounts,
            details: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[cfg(test)]
    pub fn account(&self, account_id: i64) -> Option<&AccountInfo> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    /// Full intake profile of an account. Sources without profile columns
    /// yield an empty profile.
    pub fn detail(&self, account_id: i64) -> Option<&AccountDetail> {
        self.details.get(&account_id)
    }

    pub fn statistics(&self) -> IntakeSummary {
        let count = |status: AuthStatus| {
            self.accounts
                .iter()
                .filter(|a| a.auth_status == status)
                .count()
        };
        IntakeSummary {
            total_intakes: self.accounts.len(),
            completed: count(AuthStatus::Approved),
            auth_pending: count(AuthStatus::Pending),
        }
    }

    #[instrument(level = "debug", skip_all, fields(page = query.page, page_size = query.page_size))]
    pub fn fetch_page(&self, query: &QueryParams) -> Result<IntakePage, IntakeError> {
        if query.page_size == 0 {
            return Err(IntakeError::InvalidQuery("page size must be positive".into()));
        }
        if query.page == 0 {
            return Err(IntakeError::InvalidQuery("pages start at 1".into()));
        }

        let matching: Vec<&AccountInfo> = self
            .accounts
            .iter()
            .filter(|a| query.preferred_location.matches(a) && query.auth_status.matches(a))
            .collect();

        let total_count = matching.len();
        let total_pages = total_count.div_ceil(query.page_size);
        let accounts: Vec<AccountInfo> = matching
            .into_iter()
            .skip((query.page - 1) * query.page_size)
            .take(query.page_size)
            .cloned()
            .collect();
        debug!(
            "Page {}/{} holds {} of {} accounts",
            query.page,
            total_pages,
            accounts.len(),
            total_count
        );

        Ok(IntakePage {
            accounts,
            statistics: self.statistics(),
            pagination: PaginationInfo {
                page: query.page,
                page_size: query.page_size,
                total_count,
                total_pages,
            },
        })
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Option<String>>, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        Ok(series
            .into_iter()
            .map(|value| value.map(|s| s.to_string()))
            .collect())
    }

    fn detect_file_type(path: &Path) -> Result<FileType, IntakeError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(IntakeError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, IntakeError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IntakeError::FileNotFound,
            ErrorKind::PermissionDenied => IntakeError::PermissionDenied,
            _ => IntakeError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(IntakeError::LoadingFailed("Not a file!".into()));
        }

        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size: metadata.len(),
            file_type,
        })
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::account::{AuthStatusFilter, LocationFilter};
    use crate::detail::PaymentMethod;

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/intakes.csv")
    }

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("intake-tv-{}-{name}", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn query(page: usize, page_size: usize) -> QueryParams {
        QueryParams {
            page,
            page_size,
            ..QueryParams::default()
        }
    }

    #[test]
    fn loads_fixture() {
        let source = IntakeSource::open(fixture()).unwrap();
        assert_eq!(source.name(), "intakes.csv");
        assert_eq!(source.len(), 12);

        let second = source.account(2).unwrap();
        assert_eq!(second.holder_name, "Queen West Wellness");
        assert_eq!(second.director_email(), "hello@queenwest.test");
        assert_eq!(second.is_account_active, Some(true));
        assert_eq!(source.account(1).unwrap().is_account_active, None);
    }

    #[test]
    fn loads_account_profiles() {
        let source = IntakeSource::open(fixture()).unwrap();

        let second = source.detail(2).unwrap();
        assert_eq!(
            second.organization.as_deref(),
            Some("Queen West Wellness Inc.")
        );
        assert_eq!(
            second.billing.as_ref().map(|a| a.to_string()).as_deref(),
            Some("585 Queen St W, Suite 200, Toronto, Ontario, M4G 3E2")
        );
        assert_eq!(second.shipping_address(), second.billing.as_ref());
        assert_eq!(
            second.payment.as_ref().map(|p| p.method),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(second.application_submitted, Some(true));
        assert!(second.submitted_at.is_some());

        let third = source.detail(3).unwrap();
        let payment = third.payment.as_ref().unwrap();
        assert_eq!(payment.masked_card(), "**** **** **** 4243");
        assert_eq!(payment.expiry().as_deref(), Some("10/28"));
        assert_eq!(
            third.shipping_address().map(|a| a.to_string()).as_deref(),
            Some("3 Logistics Way, Toronto, Ontario, M9W 1B1")
        );
        // no delivery on Wednesdays
        assert_eq!(third.delivery_hours.len(), 4);

        let first = source.detail(1).unwrap();
        assert_eq!(first.application_submitted, Some(false));
        assert_eq!(first.submitted_at, None);
        assert!(source.detail(99).is_none());
    }

    #[test]
    fn pages_through_all_accounts() {
        let source = IntakeSource::open(fixture()).unwrap();
        let first = source.fetch_page(&query(1, 5)).unwrap();
        assert_eq!(first.accounts.len(), 5);
        assert_eq!(first.pagination.total_pages, 3);
        assert!(first.has_more());

        let last = source.fetch_page(&query(3, 5)).unwrap();
        let ids: Vec<i64> = last.accounts.iter().map(|a| a.account_id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert!(!last.has_more());

        let past = source.fetch_page(&query(4, 5)).unwrap();
        assert!(past.accounts.is_empty());
        assert!(!past.has_more());
    }

    #[test]
    fn filters_and_statistics() {
        let source = IntakeSource::open(fixture()).unwrap();
        let page = source
            .fetch_page(&QueryParams {
                preferred_location: LocationFilter::Leaside,
                auth_status: AuthStatusFilter::Pending,
                page: 1,
                page_size: 10,
            })
            .unwrap();
        let ids: Vec<i64> = page.accounts.iter().map(|a| a.account_id).collect();
        assert_eq!(ids, vec![1, 7]);
        assert_eq!(page.pagination.total_count, 2);

        // statistics ignore the active filters
        assert_eq!(
            page.statistics,
            IntakeSummary {
                total_intakes: 12,
                completed: 5,
                auth_pending: 5,
            }
        );

        let page = source
            .fetch_page(&QueryParams {
                preferred_location: LocationFilter::Downtown,
                auth_status: AuthStatusFilter::Completed,
                page: 1,
                page_size: 10,
            })
            .unwrap();
        assert_eq!(page.pagination.total_count, 3);
    }

    #[test]
    fn rejects_bad_queries() {
        let source = IntakeSource::open(fixture()).unwrap();
        assert!(matches!(
            source.fetch_page(&query(1, 0)),
            Err(IntakeError::InvalidQuery(_))
        ));
        assert!(matches!(
            source.fetch_page(&query(0, 10)),
            Err(IntakeError::InvalidQuery(_))
        ));
    }

    #[test]
    fn open_errors() {
        assert!(matches!(
            IntakeSource::open(PathBuf::from("/definitely/not/here.csv")),
            Err(IntakeError::FileNotFound)
        ));

        let txt = scratch_file("accounts.txt", "a,b\n1,2\n");
        assert!(matches!(
            IntakeSource::open(txt),
            Err(IntakeError::UnknownFileType)
        ));

        let content = fs::read_to_string(fixture())
            .unwrap()
            .replacen("updatedAt", "modifiedAt", 1);
        let missing = scratch_file("missing.csv", &content);
        match IntakeSource::open(missing) {
            Err(IntakeError::MissingColumn(column)) => assert_eq!(column, "updatedAt"),
            other => panic!("expected missing column, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn malformed_row_is_reported() {
        let content = fs::read_to_string(fixture())
            .unwrap()
            .replacen("2025-01-02T14:30:00Z", "not-a-date", 1);
        let path = scratch_file("malformed.csv", &content);
        match IntakeSource::open(path) {
            Err(IntakeError::MalformedRecord { row, reason }) => {
                assert_eq!(row, 2);
                assert!(reason.contains("createdAt"), "{reason}");
            }
            other => panic!("expected malformed record, got {:?}", other.map(|s| s.len())),
        }
    }
}
