//! User roster command.

use std::io::{self, Write};

use star_admin::services::{RosterEntry, load_roster};

use super::{Backend, CliError};

/// Print the registered users.
///
/// # Errors
///
/// Returns `CliError::Roster` if the listing fails, including when
/// `SUPABASE_SERVICE_KEY` is not set.
pub async fn list(backend: &Backend) -> Result<(), CliError> {
    let users = load_roster(backend.data()).await?;
    let entries: Vec<RosterEntry> = users.iter().map(RosterEntry::from).collect();
    write_roster(&mut io::stdout().lock(), &entries)?;
    Ok(())
}

fn write_roster(out: &mut impl Write, entries: &[RosterEntry]) -> io::Result<()> {
    writeln!(out, "Registered Users ({})", entries.len())?;
    for entry in entries {
        writeln!(
            out,
            "{:<32}  signed up {}  last sign-in {}  {}",
            entry.email, entry.signed_up, entry.last_sign_in, entry.id
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use star_admin::services::NEVER_SIGNED_IN;
    use star_admin_core::{User, UserId};

    #[test]
    fn test_write_roster_counts_and_never() {
        let user = User {
            id: UserId::new(uuid::Uuid::nil()),
            email: Some("ada@example.com".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            last_sign_in_at: None,
        };

        let mut out = Vec::new();
        write_roster(&mut out, &[RosterEntry::from(&user)]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Registered Users (1)\n"));
        assert!(text.contains("ada@example.com"));
        assert!(text.contains("2024-01-02 03:04:05 UTC"));
        assert!(text.contains(&format!("last sign-in {NEVER_SIGNED_IN}")));
    }
}
