use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::account::{AccountInfo, AccountStatus, AuthStatus};
use crate::table::{CellValue, ColumnDef};

pub const DATE_FORMAT: &str = "%d %b %y, %I:%M %p";

fn text(value: &str) -> CellValue {
    if value.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(value.to_string())
    }
}

/// Columns of the intake accounts table.
pub fn intake_columns() -> Vec<ColumnDef<AccountInfo>> {
    vec![
        ColumnDef::new("createdAt", "Date", |a: &AccountInfo| {
            CellValue::Timestamp(a.created_at)
        })
        .cell(|_, a| Line::from(a.created_at.format(DATE_FORMAT).to_string()))
        .sortable(true),
        ColumnDef::new("accountHolderName", "Acc. Holder Name", |a: &AccountInfo| {
            text(&a.holder_name)
        }),
        ColumnDef::new("authStatus", "Status", |a: &AccountInfo| {
            CellValue::Text(a.auth_status.to_string())
        })
        .cell(|_, a| {
            let color = match a.auth_status {
                AuthStatus::Pending => Color::Red,
                AuthStatus::Approved | AuthStatus::Rejected => Color::Green,
            };
            Line::from(Span::styled(
                a.auth_status.to_string(),
                Style::new().fg(color),
            ))
        })
        .sortable(true),
        ColumnDef::new("medicalDirectorName", "Medical Director Name", |a: &AccountInfo| {
            text(a.director.name())
        }),
        ColumnDef::new("medicalDirectorLicense", "Director's License", |a: &AccountInfo| {
            text(a.director.license())
        }),
        ColumnDef::new("medicalDirectorEmail", "Director's Email", |a: &AccountInfo| {
            text(a.director_email())
        })
        .cell(|value, _| {
            Line::from(Span::styled(
                value.to_string(),
                Style::new().add_modifier(Modifier::UNDERLINED),
            ))
        })
        .sortable(true),
        ColumnDef::new("accountStatus", "Account", |a: &AccountInfo| {
            CellValue::Bool(a.account_status == AccountStatus::Active)
        })
        .header_with(|| {
            Line::from(Span::styled(
                "Account",
                Style::new().add_modifier(Modifier::ITALIC),
            ))
        })
        .cell(|_, a| match a.account_status {
            AccountStatus::Active => Line::from("active"),
            AccountStatus::Inactive => Line::from(Span::styled(
                "inactive",
                Style::new().fg(Color::DarkGray),
            )),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{DirectorContact, Location};
    use crate::table::DataTable;

    fn account(
        id: i64,
        created: &str,
        status: AuthStatus,
        director: DirectorContact,
    ) -> AccountInfo {
        let ts = chrono::DateTime::parse_from_rfc3339(created).unwrap();
        AccountInfo {
            account_id: id,
            created_at: ts,
            updated_at: ts,
            holder_name: format!("Holder {id}"),
            holder_email: format!("holder{id}@clinic.test"),
            director,
            auth_status: status,
            is_account_active: Some(true),
            account_status: AccountStatus::Active,
            preferred_location: Location::Downtown,
        }
    }

    fn own_director() -> DirectorContact {
        DirectorContact::AccountHolder {
            name: "Dr. Self".into(),
            license: "L-1".into(),
        }
    }

    #[test]
    fn date_cell_uses_dashboard_format() {
        let columns = intake_columns();
        let a = account(1, "2025-02-07T15:04:00+00:00", AuthStatus::Pending, own_director());
        assert_eq!(columns[0].render_cell(&a).to_string(), "07 Feb 25, 03:04 PM");
    }

    #[test]
    fn director_email_falls_back_to_holder() {
        let columns = intake_columns();
        let email = columns
            .iter()
            .find(|c| c.id == "medicalDirectorEmail")
            .unwrap();
        let a = account(4, "2025-02-07T15:04:00Z", AuthStatus::Pending, own_director());
        assert_eq!(email.render_cell(&a).to_string(), "holder4@clinic.test");

        let b = account(
            5,
            "2025-02-07T15:04:00Z",
            AuthStatus::Pending,
            DirectorContact::Separate {
                name: "Dr. Other".into(),
                license: "L-2".into(),
                email: "other@clinic.test".into(),
            },
        );
        assert_eq!(email.render_cell(&b).to_string(), "other@clinic.test");
    }

    #[test]
    fn pending_status_is_red() {
        let columns = intake_columns();
        let a = account(1, "2025-02-07T15:04:00Z", AuthStatus::Pending, own_director());
        let line = columns[2].render_cell(&a);
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn sortable_columns_match_dashboard() {
        let table = DataTable::new(intake_columns());
        let sortable: Vec<&str> = table
            .columns()
            .iter()
            .filter(|c| c.sortable)
            .map(|c| c.id)
            .collect();
        assert_eq!(sortable, vec!["createdAt", "authStatus", "medicalDirectorEmail"]);
    }

    #[test]
    fn five_accounts_sort_by_created_at() {
        let rows = vec![
            account(1, "2025-01-03T08:00:00Z", AuthStatus::Approved, own_director()),
            account(2, "2025-01-01T08:00:00Z", AuthStatus::Pending, own_director()),
            account(3, "2025-01-05T08:00:00Z", AuthStatus::Rejected, own_director()),
            account(4, "2025-01-02T08:00:00Z", AuthStatus::Pending, own_director()),
            account(5, "2025-01-04T08:00:00Z", AuthStatus::Approved, own_director()),
        ];
        let mut table = DataTable::new(intake_columns());
        let ids = |table: &DataTable<AccountInfo>| -> Vec<i64> {
            table
                .row_order(&rows)
                .into_iter()
                .map(|i| rows[i].account_id)
                .collect()
        };

        table.toggle_sort("createdAt");
        assert_eq!(ids(&table), vec![2, 4, 1, 5, 3]);
        table.toggle_sort("createdAt");
        assert_eq!(ids(&table), vec![3, 5, 1, 4, 2]);
    }
}
