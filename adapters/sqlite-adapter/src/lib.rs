//! sqlite-adapter — SQLite implementation of the settings store and link
//! registry ports for local/dev deployments.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the redirector without
//!   external services.
//! - Implements `RedirectStore` and `LinkRegistry` from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH.
//! - A list and its entries are replaced inside one transaction, so readers
//!   never observe a half-written list.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{CoreError, Entry, Keyword, LinkRegistry, RedirectList, RedirectStore};
use rusqlite::{params, Connection, Rows};

/// SQLite-backed store for local development.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open at `path`, creating parent directories first.
    pub fn open_creating_dirs<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), err = %e, "could not create database directory");
            }
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS redirect_lists (
            keyword TEXT PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 1,
            updated_at INTEGER
        );
        CREATE TABLE IF NOT EXISTS redirect_entries (
            keyword TEXT NOT NULL,
            position INTEGER NOT NULL,
            url TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (keyword, position)
        );
        CREATE TABLE IF NOT EXISTS shortlinks (
            keyword TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0)).as_secs() as i64
}

fn secs_to_system_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

const SELECT_LISTS: &str = "SELECT l.keyword, l.enabled, l.updated_at, e.url, e.weight \
     FROM redirect_lists l JOIN redirect_entries e ON e.keyword = l.keyword";

/// Fold joined rows (ordered by keyword, position) into lists.
fn collect_lists(mut rows: Rows<'_>) -> Result<Vec<RedirectList>, CoreError> {
    struct Pending {
        keyword: String,
        enabled: bool,
        updated_at: Option<i64>,
        entries: Vec<Entry>,
    }

    fn finish(p: Pending) -> Result<RedirectList, CoreError> {
        let keyword = Keyword::new(p.keyword)
            .map_err(|e| CoreError::Repository(format!("bad keyword in db: {e}")))?;
        let mut list = RedirectList::new(keyword, p.entries, p.enabled)
            .map_err(|e| CoreError::Repository(format!("bad list in db: {e}")))?;
        list.updated_at = p.updated_at.map(secs_to_system_time);
        Ok(list)
    }

    let mut out = Vec::new();
    let mut current: Option<Pending> = None;
    while let Some(row) = rows.next().map_err(map_sqerr)? {
        let keyword: String = row.get(0).map_err(map_sqerr)?;
        let url: String = row.get(3).map_err(map_sqerr)?;
        let weight: f64 = row.get(4).map_err(map_sqerr)?;
        match current.as_mut() {
            Some(p) if p.keyword == keyword => p.entries.push(Entry { url, weight }),
            _ => {
                if let Some(done) = current.take() {
                    out.push(finish(done)?);
                }
                let enabled: i64 = row.get(1).map_err(map_sqerr)?;
                current = Some(Pending {
                    keyword,
                    enabled: enabled != 0,
                    updated_at: row.get(2).map_err(map_sqerr)?,
                    entries: vec![Entry { url, weight }],
                });
            }
        }
    }
    if let Some(done) = current {
        out.push(finish(done)?);
    }
    Ok(out)
}

impl RedirectStore for SqliteRepo {
    fn get(&self, keyword: &Keyword) -> Result<Option<RedirectList>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_LISTS} WHERE l.keyword = ?1 ORDER BY e.position"))
            .map_err(map_sqerr)?;
        let rows = stmt.query(params![keyword.as_str()]).map_err(map_sqerr)?;
        Ok(collect_lists(rows)?.into_iter().next())
    }

    fn put(&self, list: RedirectList) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute(
            "INSERT INTO redirect_lists(keyword, enabled, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(keyword) DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at",
            params![
                list.keyword.as_str(),
                list.enabled as i64,
                list.updated_at.map(system_time_to_secs),
            ],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            "DELETE FROM redirect_entries WHERE keyword = ?1",
            params![list.keyword.as_str()],
        )
        .map_err(map_sqerr)?;
        for (position, entry) in list.entries().iter().enumerate() {
            tx.execute(
                "INSERT INTO redirect_entries(keyword, position, url, weight) VALUES (?1, ?2, ?3, ?4)",
                params![list.keyword.as_str(), position as i64, entry.url, entry.weight],
            )
            .map_err(map_sqerr)?;
        }
        tx.commit().map_err(map_sqerr)
    }

    fn delete(&self, keyword: &Keyword) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute(
            "DELETE FROM redirect_entries WHERE keyword = ?1",
            params![keyword.as_str()],
        )
        .map_err(map_sqerr)?;
        let changed = tx
            .execute(
                "DELETE FROM redirect_lists WHERE keyword = ?1",
                params![keyword.as_str()],
            )
            .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn list(&self) -> Result<Vec<RedirectList>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_LISTS} ORDER BY l.keyword, e.position"))
            .map_err(map_sqerr)?;
        let rows = stmt.query([]).map_err(map_sqerr)?;
        collect_lists(rows)
    }
}

impl LinkRegistry for SqliteRepo {
    fn lookup(&self, keyword: &Keyword) -> Result<Option<String>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT url FROM shortlinks WHERE keyword = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![keyword.as_str()]).map_err(map_sqerr)?;
        match rows.next().map_err(map_sqerr)? {
            Some(row) => Ok(Some(row.get(0).map_err(map_sqerr)?)),
            None => Ok(None),
        }
    }

    fn create(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let res = conn.execute(
            "INSERT INTO shortlinks(keyword, url, created_at) VALUES (?1, ?2, ?3)",
            params![keyword.as_str(), url, system_time_to_secs(SystemTime::now())],
        );
        match res {
            Ok(_) => Ok(()),
            Err(e) => {
                if let rusqlite::Error::SqliteFailure(err, _) = &e {
                    if err.code == rusqlite::ErrorCode::ConstraintViolation {
                        return Err(CoreError::Registry(format!(
                            "shortlink '{}' already exists",
                            keyword
                        )));
                    }
                }
                Err(map_sqerr(e))
            }
        }
    }

    fn update(&self, keyword: &Keyword, url: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE shortlinks SET url = ?1, updated_at = ?2 WHERE keyword = ?3",
                params![url, system_time_to_secs(SystemTime::now()), keyword.as_str()],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let repo = SqliteRepo::new(path).unwrap();
        (repo, dir)
    }

    fn list(keyword: &str, entries: &[(&str, f64)], enabled: bool) -> RedirectList {
        RedirectList::new(
            Keyword::new(keyword).unwrap(),
            entries.iter().map(|(u, w)| Entry::new(*u, *w)).collect(),
            enabled,
        )
        .unwrap()
    }

    #[test]
    fn put_get_roundtrip() {
        let (repo, _dir) = tmp_db();
        let mut l = list("promo/a", &[("https://a.com", 70.0), ("https://b.com", 0.0)], false);
        l.updated_at = Some(UNIX_EPOCH + Duration::from_secs(42));
        repo.put(l.clone()).unwrap();
        let got = repo.get(&l.keyword).unwrap().unwrap();
        assert_eq!(got, l);
    }

    #[test]
    fn get_missing_is_none() {
        let (repo, _dir) = tmp_db();
        assert!(repo.get(&Keyword::new("nope").unwrap()).unwrap().is_none());
    }

    #[test]
    fn put_replaces_entries_wholesale() {
        let (repo, _dir) = tmp_db();
        repo.put(list("k", &[("https://a.com", 1.0), ("https://b.com", 2.0), ("https://c.com", 3.0)], true))
            .unwrap();
        repo.put(list("k", &[("https://z.com", 5.0)], true)).unwrap();
        let got = repo.get(&Keyword::new("k").unwrap()).unwrap().unwrap();
        assert_eq!(got.entries(), &[Entry::new("https://z.com", 5.0)]);
    }

    #[test]
    fn list_orders_by_keyword_and_position() {
        let (repo, _dir) = tmp_db();
        repo.put(list("zeta", &[("https://z1.com", 1.0), ("https://z2.com", 2.0)], true))
            .unwrap();
        repo.put(list("alpha", &[("https://a.com", 1.0)], true)).unwrap();
        let items = repo.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].keyword.as_str(), "alpha");
        assert_eq!(items[1].keyword.as_str(), "zeta");
        assert_eq!(items[1].entries()[0].url, "https://z1.com");
        assert_eq!(items[1].entries()[1].url, "https://z2.com");
    }

    #[test]
    fn delete_removes_list_and_entries() {
        let (repo, _dir) = tmp_db();
        let k = Keyword::new("gone").unwrap();
        repo.put(list("gone", &[("https://a.com", 1.0)], true)).unwrap();
        repo.delete(&k).unwrap();
        assert!(repo.get(&k).unwrap().is_none());
        assert!(matches!(repo.delete(&k), Err(CoreError::NotFound)));
    }

    #[test]
    fn shortlink_create_lookup_update() {
        let (repo, _dir) = tmp_db();
        let k = Keyword::new("promo").unwrap();
        assert_eq!(repo.lookup(&k).unwrap(), None);
        repo.create(&k, "https://a.com").unwrap();
        assert!(matches!(
            repo.create(&k, "https://b.com"),
            Err(CoreError::Registry(_))
        ));
        repo.update(&k, "https://b.com").unwrap();
        assert_eq!(repo.lookup(&k).unwrap().as_deref(), Some("https://b.com"));
        let other = Keyword::new("other").unwrap();
        assert!(matches!(repo.update(&other, "https://c.com"), Err(CoreError::NotFound)));
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/t.db");
        {
            let repo = SqliteRepo::open_creating_dirs(&path).unwrap();
            repo.put(list("persist", &[("https://a.com", 1.0)], true)).unwrap();
        }
        let repo = SqliteRepo::open_creating_dirs(&path).unwrap();
        assert!(repo.get(&Keyword::new("persist").unwrap()).unwrap().is_some());
    }
}
