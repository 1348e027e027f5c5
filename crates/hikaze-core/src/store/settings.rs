//! Key/value application settings kept alongside the catalog.

use super::CatalogStore;
use crate::error::{HikazeError, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

impl CatalogStore {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(HikazeError::validation("key", "setting key must not be empty"));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_settings(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn list_settings(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM app_settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::create_test_store;

    #[test]
    fn test_settings_roundtrip() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.get_setting("theme").unwrap(), None);

        store.set_setting("theme", "dark").unwrap();
        store.set_setting("language", "en-US").unwrap();

        let all = store.list_settings().unwrap();
        assert_eq!(all.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(all.get("language").map(String::as_str), Some("en-US"));
        assert!(store.set_setting("  ", "x").is_err());
    }
}
