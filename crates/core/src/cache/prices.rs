//! Price record persistence.
//!
//! `PriceCache` is the storage seam: point lookup and upsert by product, with
//! no opinion on freshness. `CacheDb` implements it on SQLite.

use super::connection::CacheDb;
use crate::Error;
use crate::price::{CacheRecord, PriceQuantity, ProductQuery, Source};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Storage backend for resolved prices.
#[async_trait::async_trait]
pub trait PriceCache: Send + Sync {
    /// Look up the last record for `key`; a missing key is `Ok(None)`.
    async fn get(&self, key: &ProductQuery) -> Result<Option<CacheRecord>, Error>;

    /// Insert or overwrite the record for `record.key`.
    async fn put(&self, record: &CacheRecord) -> Result<(), Error>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), Error>;
}

struct PriceRow {
    name: String,
    price: String,
    quantity: String,
    resolved_at: String,
    source: String,
    source_url: String,
}

impl PriceRow {
    fn into_record(self) -> Result<CacheRecord, Error> {
        let resolved_at = DateTime::parse_from_rfc3339(&self.resolved_at)
            .map_err(|e| Error::CorruptRecord(format!("{}: resolved_at {}: {e}", self.name, self.resolved_at)))?
            .with_timezone(&Utc);

        Ok(CacheRecord {
            key: ProductQuery::new(&self.name),
            value: PriceQuantity::new(self.price, self.quantity),
            resolved_at,
            source: Source::new(self.source, self.source_url),
        })
    }
}

impl CacheDb {
    /// Get the stored record for a product.
    ///
    /// Returns None if the product has never been resolved.
    pub async fn get_price(&self, key: &ProductQuery) -> Result<Option<CacheRecord>, Error> {
        let name = key.display_name();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<PriceRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT name, price, quantity, resolved_at, source, source_url
                    FROM prices WHERE name = ?1",
                )?;

                let result = stmt.query_row(params![name], |row| {
                    Ok(PriceRow {
                        name: row.get(0)?,
                        price: row.get(1)?,
                        quantity: row.get(2)?,
                        resolved_at: row.get(3)?,
                        source: row.get(4)?,
                        source_url: row.get(5)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(PriceRow::into_record).transpose()
    }

    /// Insert or update the record for a product.
    ///
    /// Uses UPSERT semantics keyed by display name, so a product never has
    /// more than one row.
    pub async fn upsert_price(&self, record: &CacheRecord) -> Result<(), Error> {
        let name = record.key.display_name();
        let price = record.value.price.clone();
        let quantity = record.value.quantity.clone();
        let resolved_at = record.resolved_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let source = record.source.strategy.clone();
        let source_url = record.source.url.clone();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO prices (name, price, quantity, resolved_at, source, source_url)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(name) DO UPDATE SET
                        price = excluded.price,
                        quantity = excluded.quantity,
                        resolved_at = excluded.resolved_at,
                        source = excluded.source,
                        source_url = excluded.source_url",
                    params![name, price, quantity, resolved_at, source, source_url],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored price records.
    pub async fn count_prices(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM prices", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl PriceCache for CacheDb {
    async fn get(&self, key: &ProductQuery) -> Result<Option<CacheRecord>, Error> {
        self.get_price(key).await
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), Error> {
        self.upsert_price(record).await
    }

    async fn ping(&self) -> Result<(), Error> {
        CacheDb::ping(self).await
    }
}
