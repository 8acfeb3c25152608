use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "block_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Blocked network address (IPv4/IPv6 literal). Not unique: deactivated
    /// entries for the same address are kept as history.
    pub subject: String,

    /// Free-text classification, e.g. "manual" or "threshold-exceeded:<identity>".
    /// Opaque to the core; never parsed for control flow.
    #[sea_orm(column_type = "Text")]
    pub reason: String,

    pub created_at: DateTime<Utc>,

    /// Absent means permanent until explicitly removed.
    pub expires_at: Option<DateTime<Utc>>,

    /// Display cache only. The authoritative state is derived via
    /// [`Model::is_effectively_active`]; decision paths must not trust this.
    pub active: bool,

    /// Set once by an explicit unblock; never cleared.
    pub removed_at: Option<DateTime<Utc>>,

    pub removed_by: Option<String>,
}

impl Model {
    /// A block restricts logins iff it was never explicitly removed and its
    /// expiry (if any) is still in the future.
    pub fn is_effectively_active(&self, now: DateTime<Utc>) -> bool {
        self.removed_at.is_none() && self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expires_at: Option<DateTime<Utc>>, removed_at: Option<DateTime<Utc>>) -> Model {
        Model {
            id: Uuid::new_v4(),
            subject: "10.0.0.5".into(),
            reason: "manual".into(),
            created_at: Utc::now() - chrono::Duration::hours(2),
            expires_at,
            active: true,
            removed_at,
            removed_by: None,
        }
    }

    #[test]
    fn test_permanent_entry_stays_active() {
        let e = entry(None, None);
        assert!(e.is_effectively_active(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn test_expired_entry_is_inactive_without_removal() {
        let e = entry(Some(Utc::now() - chrono::Duration::minutes(1)), None);
        assert!(!e.is_effectively_active(Utc::now()));
    }

    #[test]
    fn test_future_expiry_is_active() {
        let e = entry(Some(Utc::now() + chrono::Duration::hours(1)), None);
        assert!(e.is_effectively_active(Utc::now()));
    }

    #[test]
    fn test_removed_entry_is_inactive_regardless_of_expiry() {
        let e = entry(Some(Utc::now() + chrono::Duration::hours(1)), Some(Utc::now()));
        assert!(!e.is_effectively_active(Utc::now()));
    }

    #[test]
    fn test_stored_flag_is_not_consulted() {
        let mut e = entry(Some(Utc::now() - chrono::Duration::minutes(1)), None);
        e.active = true;
        assert!(!e.is_effectively_active(Utc::now()));
    }
}
