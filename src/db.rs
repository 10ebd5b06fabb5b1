use eyre::Result;
use rusqlite::{params, types::Type, Connection};
use uuid::Uuid;

use crate::models::{AddressEntry, Blockchain};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS addresses (
  seq        INTEGER PRIMARY KEY AUTOINCREMENT,
  id         TEXT UNIQUE NOT NULL,
  user_id    TEXT NOT NULL,
  blockchain TEXT NOT NULL, -- lowercase identifier
  address    TEXT NOT NULL,
  created_at TEXT NOT NULL DEFAULT (datetime('now')),
  UNIQUE(user_id, blockchain, address)
);

CREATE INDEX IF NOT EXISTS idx_addresses_user ON addresses(user_id);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// A user's addresses in the order they were added
pub fn load_addresses(conn: &Connection, user_id: &str) -> Result<Vec<AddressEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, blockchain, address
         FROM addresses
         WHERE user_id = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map([user_id], |r| {
        let id: String = r.get(0)?;
        let id = Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let blockchain: String = r.get(1)?;

        Ok(AddressEntry {
            id,
            blockchain: Blockchain::parse(&blockchain),
            address: r.get(2)?,
        })
    })?;

    let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn insert_address(conn: &Connection, user_id: &str, entry: &AddressEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO addresses (id, user_id, blockchain, address, created_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        params![
            entry.id.to_string(),
            user_id,
            entry.blockchain.as_str(),
            entry.address
        ],
    )?;
    Ok(())
}

/// Returns false when nothing matched
pub fn delete_address(conn: &Connection, user_id: &str, id: Uuid) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM addresses WHERE user_id = ?1 AND id = ?2",
        params![user_id, id.to_string()],
    )?;
    Ok(removed > 0)
}

#[cfg(test)]
pub(crate) fn in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    run_migrations(&conn).expect("migrations");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chain: Blockchain, address: &str) -> AddressEntry {
        AddressEntry {
            id: Uuid::new_v4(),
            blockchain: chain,
            address: address.to_string(),
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = in_memory();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn addresses_load_in_insertion_order_per_user() {
        let conn = in_memory();
        let a = entry(Blockchain::Ethereum, "0xabc");
        let b = entry(Blockchain::Bitcoin, "1BoatSLRHtKNngkdXEeobR76b53LETtpyT");
        let other = entry(Blockchain::Dogecoin, "DH5yaieqoZN36fDVciNyRueRGvGLR3mr7L");

        insert_address(&conn, "alice", &a).unwrap();
        insert_address(&conn, "bob", &other).unwrap();
        insert_address(&conn, "alice", &b).unwrap();

        assert_eq!(load_addresses(&conn, "alice").unwrap(), vec![a, b]);
        assert_eq!(load_addresses(&conn, "bob").unwrap(), vec![other]);
        assert!(load_addresses(&conn, "carol").unwrap().is_empty());
    }

    #[test]
    fn duplicate_pair_is_rejected_by_schema() {
        let conn = in_memory();
        insert_address(&conn, "alice", &entry(Blockchain::Bitcoin, "X")).unwrap();
        assert!(insert_address(&conn, "alice", &entry(Blockchain::Bitcoin, "X")).is_err());
        insert_address(&conn, "bob", &entry(Blockchain::Bitcoin, "X")).unwrap();
    }

    #[test]
    fn delete_is_scoped_to_user() {
        let conn = in_memory();
        let a = entry(Blockchain::Litecoin, "L1");
        insert_address(&conn, "alice", &a).unwrap();

        assert!(!delete_address(&conn, "bob", a.id).unwrap());
        assert!(delete_address(&conn, "alice", a.id).unwrap());
        assert!(!delete_address(&conn, "alice", a.id).unwrap());
        assert!(load_addresses(&conn, "alice").unwrap().is_empty());
    }
}
