//! Download token persistence and single-use redemption.

use phoneprov_core::mac::MacAddr;
use phoneprov_core::token::{self, DownloadToken, RedeemDenied};
use rusqlite::{Row, params};
use tracing::info;

use crate::{Database, DbError, DbResult};

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadToken> {
    let mac: Option<String> = row.get(3)?;
    let mac = mac
        .map(|raw| {
            MacAddr::parse(&raw).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })
        .transpose()?;
    Ok(DownloadToken {
        id: row.get(0)?,
        token: row.get(1)?,
        config_version_id: row.get(2)?,
        mac,
        device_model: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        expires_at: row.get(7)?,
        used_at: row.get(8)?,
    })
}

const TOKEN_COLUMNS: &str = "id, token, config_version_id, mac, device_model,
                             created_by, created_at, expires_at, used_at";

impl Database {
    /// Mint a single-use download token for a config version.
    ///
    /// The token is bound to `mac` when given; redemption from any other
    /// MAC is refused.
    pub fn mint_token(
        &self,
        actor: &str,
        version_id: i64,
        mac: Option<&MacAddr>,
        device_model: Option<&str>,
        ttl_secs: u32,
    ) -> DbResult<DownloadToken> {
        if self.get_version(version_id)?.is_none() {
            return Err(DbError::NotFound(format!("config version {version_id}")));
        }

        let secret = token::generate_token();
        let expires_at = token::expiry_timestamp(ttl_secs);
        self.conn.execute(
            r"INSERT INTO download_tokens
                (token, config_version_id, mac, device_model, created_by, expires_at)
              VALUES (?, ?, ?, ?, ?, ?)",
            params![
                secret,
                version_id,
                mac.map(MacAddr::as_plain),
                device_model,
                actor,
                expires_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        info!(token_id = id, version_id, "Minted download token");
        self.token_by_id(id)?
            .ok_or_else(|| DbError::NotFound(format!("download token {id}")))
    }

    /// Look a token up by its secret string.
    pub fn get_token(&self, secret: &str) -> DbResult<Option<DownloadToken>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM download_tokens WHERE token = ?"
        ))?;
        let mut rows = stmt.query_map(params![secret], token_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Look a token up by row id.
    pub fn token_by_id(&self, id: i64) -> DbResult<Option<DownloadToken>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TOKEN_COLUMNS} FROM download_tokens WHERE id = ?"))?;
        let mut rows = stmt.query_map(params![id], token_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// All tokens, newest first.
    pub fn list_tokens(&self) -> DbResult<Vec<DownloadToken>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TOKEN_COLUMNS} FROM download_tokens ORDER BY id DESC"))?;
        let tokens = stmt.query_map([], token_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    /// Delete an unredeemed token. Redeemed tokens stay as a record of the
    /// download and cannot be revoked.
    pub fn revoke_token(&self, id: i64) -> DbResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM download_tokens WHERE id = ? AND used_at IS NULL", params![id])?;
        if deleted > 0 {
            info!(token_id = id, "Revoked download token");
            return Ok(());
        }
        match self.token_by_id(id)? {
            Some(_) => Err(DbError::Conflict(format!("download token {id} already redeemed"))),
            None => Err(DbError::NotFound(format!("download token {id}"))),
        }
    }

    /// Redeem a token exactly once.
    ///
    /// A MAC-scoped token is refused unless the matching MAC is presented.
    /// The `used_at` stamp is claimed with a compare-and-set UPDATE, so of
    /// any number of concurrent redemptions exactly one wins. Returns the
    /// redeemed row so the caller can serve its bound version.
    pub fn redeem_token(&self, secret: &str, mac: Option<&MacAddr>) -> DbResult<DownloadToken> {
        let Some(found) = self.get_token(secret)? else {
            return Err(DbError::TokenDenied(RedeemDenied::Unknown));
        };

        let now: String =
            self.conn.query_row("SELECT datetime('now')", [], |row| row.get(0))?;
        if found.is_expired(&now) {
            return Err(DbError::TokenDenied(RedeemDenied::Expired));
        }
        if found.is_redeemed() {
            return Err(DbError::TokenDenied(RedeemDenied::AlreadyUsed));
        }
        if let Some(bound) = &found.mac
            && mac != Some(bound)
        {
            return Err(DbError::TokenDenied(RedeemDenied::MacMismatch));
        }

        let claimed = self.conn.execute(
            "UPDATE download_tokens SET used_at = datetime('now')
             WHERE id = ? AND used_at IS NULL",
            params![found.id],
        )?;
        if claimed == 0 {
            // Another redemption won between our read and the update.
            return Err(DbError::TokenDenied(RedeemDenied::AlreadyUsed));
        }

        info!(token_id = found.id, "Download token redeemed");
        self.token_by_id(found.id)?
            .ok_or_else(|| DbError::NotFound(format!("download token {}", found.id)))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use phoneprov_core::version::VersionScope;

    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn fixture_version(db: &Database) -> i64 {
        let pabx = db.create_pabx("hq", "10.0.0.5", 5060).unwrap();
        let dtype = db.create_device_type("Yealink T46", "Yealink SIP-T46G").unwrap();
        let scope = VersionScope { pabx_id: pabx.id, device_type_id: dtype.id };
        db.create_version("admin", scope, "srv=pbx.example\n", None).unwrap().id
    }

    #[test]
    fn test_mint_produces_hex_secret_with_expiry() {
        let db = test_db();
        let version_id = fixture_version(&db);

        let minted = db.mint_token("admin", version_id, None, None, 3600).unwrap();
        assert_eq!(minted.token.len(), 64);
        assert!(minted.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(minted.expires_at > minted.created_at);
        assert!(!minted.is_redeemed());
    }

    #[test]
    fn test_mint_requires_existing_version() {
        let db = test_db();
        assert_matches!(
            db.mint_token("admin", 99, None, None, 3600),
            Err(DbError::NotFound(_))
        );
    }

    #[test]
    fn test_redeem_marks_used_once() {
        let db = test_db();
        let version_id = fixture_version(&db);
        let minted = db.mint_token("admin", version_id, None, None, 3600).unwrap();
        let mac = MacAddr::parse("00:15:65:aa:bb:cc").unwrap();

        let redeemed = db.redeem_token(&minted.token, Some(&mac)).unwrap();
        assert!(redeemed.is_redeemed());
        assert_eq!(redeemed.config_version_id, version_id);

        assert_matches!(
            db.redeem_token(&minted.token, Some(&mac)),
            Err(DbError::TokenDenied(RedeemDenied::AlreadyUsed))
        );
    }

    #[test]
    fn test_redeem_unknown_token() {
        let db = test_db();
        let mac = MacAddr::parse("001565aabbcc").unwrap();
        assert_matches!(
            db.redeem_token("deadbeef", Some(&mac)),
            Err(DbError::TokenDenied(RedeemDenied::Unknown))
        );
    }

    #[test]
    fn test_redeem_expired_token() {
        let db = test_db();
        let version_id = fixture_version(&db);
        let minted = db.mint_token("admin", version_id, None, None, 3600).unwrap();
        db.conn
            .execute(
                "UPDATE download_tokens SET expires_at = datetime('now', '-1 hour') WHERE id = ?",
                params![minted.id],
            )
            .expect("Failed to backdate expiry");

        let mac = MacAddr::parse("001565aabbcc").unwrap();
        assert_matches!(
            db.redeem_token(&minted.token, Some(&mac)),
            Err(DbError::TokenDenied(RedeemDenied::Expired))
        );
    }

    #[test]
    fn test_redeem_respects_mac_scope() {
        let db = test_db();
        let version_id = fixture_version(&db);
        let bound = MacAddr::parse("001565aabbcc").unwrap();
        let minted = db.mint_token("admin", version_id, Some(&bound), None, 3600).unwrap();

        let other = MacAddr::parse("001565ddeeff").unwrap();
        assert_matches!(
            db.redeem_token(&minted.token, Some(&other)),
            Err(DbError::TokenDenied(RedeemDenied::MacMismatch))
        );
        assert_matches!(
            db.redeem_token(&minted.token, None),
            Err(DbError::TokenDenied(RedeemDenied::MacMismatch))
        );

        // Any notation of the bound MAC succeeds.
        let same = MacAddr::parse("00:15:65:AA:BB:CC").unwrap();
        assert!(db.redeem_token(&minted.token, Some(&same)).is_ok());
    }

    #[test]
    fn test_revoke_deletes_unredeemed_only() {
        let db = test_db();
        let version_id = fixture_version(&db);
        let minted = db.mint_token("admin", version_id, None, None, 3600).unwrap();

        db.revoke_token(minted.id).unwrap();
        assert!(db.token_by_id(minted.id).unwrap().is_none());

        let second = db.mint_token("admin", version_id, None, None, 3600).unwrap();
        let mac = MacAddr::parse("001565aabbcc").unwrap();
        db.redeem_token(&second.token, Some(&mac)).unwrap();
        assert_matches!(db.revoke_token(second.id), Err(DbError::Conflict(_)));
        assert!(db.token_by_id(second.id).unwrap().is_some());
    }

    #[test]
    fn test_version_delete_cascades_tokens() {
        let db = test_db();
        let version_id = fixture_version(&db);
        let minted = db.mint_token("admin", version_id, None, None, 3600).unwrap();

        db.conn
            .execute("DELETE FROM config_versions WHERE id = ?", params![version_id])
            .expect("Failed to delete version");
        assert!(db.token_by_id(minted.id).unwrap().is_none());
    }
}
