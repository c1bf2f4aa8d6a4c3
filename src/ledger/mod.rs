use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::error::{BotError, BotResult};
use crate::types::{Position, Side, Trade};

mod summary;

pub use summary::LedgerSummary;

/// Durable single-writer store for trades and positions, backed by a
/// single-file SQLite database opened with WAL journaling. Schema creation
/// is idempotent, so opening an existing ledger file is safe.
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub async fn open(db_path: &str) -> BotResult<Self> {
        info!(db_path, "opening position ledger");

        let options = SqliteConnectOptions::from_str(db_path)
            .map_err(|e| BotError::InvalidConfig(format!("bad ledger path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let ledger = Self { pool };
        ledger.create_schema().await?;
        Ok(ledger)
    }

    async fn create_schema(&self) -> BotResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                price TEXT NOT NULL,
                total TEXT NOT NULL,
                strategy TEXT NOT NULL,
                signal_reason TEXT NOT NULL,
                indicator_values_json TEXT NOT NULL,
                paper_trade INTEGER NOT NULL,
                ts TEXT NOT NULL,
                exchange_order_id TEXT,
                profit_loss TEXT,
                profit_loss_percent TEXT,
                related_buy_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_symbol_ts ON trades(symbol, ts)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                quantity TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                strategy TEXT NOT NULL,
                is_open INTEGER NOT NULL,
                exit_price TEXT,
                exit_time TEXT,
                profit_loss TEXT,
                profit_loss_percent TEXT,
                buy_trade_id INTEGER NOT NULL,
                sell_trade_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_positions_symbol_open ON positions(symbol, is_open)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomic single-row insert, returns the assigned id.
    pub async fn insert_trade(&self, trade: &Trade) -> BotResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades
                (symbol, side, quantity, price, total, strategy, signal_reason,
                 indicator_values_json, paper_trade, ts, exchange_order_id,
                 profit_loss, profit_loss_percent, related_buy_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.quantity.to_string())
        .bind(trade.price.to_string())
        .bind(trade.total.to_string())
        .bind(&trade.strategy)
        .bind(&trade.signal_reason)
        .bind(&trade.indicator_values_json)
        .bind(trade.paper_trade)
        .bind(trade.ts.to_rfc3339())
        .bind(&trade.exchange_order_id)
        .bind(trade.profit_loss.map(|d| d.to_string()))
        .bind(trade.profit_loss_percent.map(|d| d.to_string()))
        .bind(trade.related_buy_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Inserts every trade in one transaction, for bulk seed/demo loads.
    pub async fn insert_trades_tx(&self, trades: &[Trade]) -> BotResult<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(trades.len());

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades
                    (symbol, side, quantity, price, total, strategy, signal_reason,
                     indicator_values_json, paper_trade, ts, exchange_order_id,
                     profit_loss, profit_loss_percent, related_buy_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&trade.symbol)
            .bind(trade.side.as_str())
            .bind(trade.quantity.to_string())
            .bind(trade.price.to_string())
            .bind(trade.total.to_string())
            .bind(&trade.strategy)
            .bind(&trade.signal_reason)
            .bind(&trade.indicator_values_json)
            .bind(trade.paper_trade)
            .bind(trade.ts.to_rfc3339())
            .bind(&trade.exchange_order_id)
            .bind(trade.profit_loss.map(|d| d.to_string()))
            .bind(trade.profit_loss_percent.map(|d| d.to_string()))
            .bind(trade.related_buy_id)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Fails with `PositionAlreadyOpen` if `symbol` already has an open row.
    pub async fn open_position(&self, position: &Position) -> BotResult<i64> {
        if self.find_open_position(&position.symbol).await?.is_some() {
            return Err(BotError::PositionAlreadyOpen {
                symbol: position.symbol.clone(),
            });
        }

        let result = sqlx::query(
            r#"
            INSERT INTO positions
                (symbol, quantity, entry_price, entry_time, strategy, is_open, buy_trade_id)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&position.symbol)
        .bind(position.quantity.to_string())
        .bind(position.entry_price.to_string())
        .bind(position.entry_time.to_rfc3339())
        .bind(&position.strategy)
        .bind(position.buy_trade_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fails with `NotOpen` if the row is already closed.
    #[allow(clippy::too_many_arguments)]
    pub async fn close_position(
        &self,
        id: i64,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        profit_loss: Decimal,
        profit_loss_percent: Decimal,
        sell_trade_id: i64,
    ) -> BotResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE positions
            SET is_open = 0, exit_price = ?, exit_time = ?, profit_loss = ?,
                profit_loss_percent = ?, sell_trade_id = ?
            WHERE id = ? AND is_open = 1
            "#,
        )
        .bind(exit_price.to_string())
        .bind(exit_time.to_rfc3339())
        .bind(profit_loss.to_string())
        .bind(profit_loss_percent.to_string())
        .bind(sell_trade_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::NotOpen { id });
        }
        Ok(())
    }

    /// Used at startup to recover in-memory position state.
    pub async fn find_open_position(&self, symbol: &str) -> BotResult<Option<Position>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM positions
            WHERE symbol = ? AND is_open = 1
            ORDER BY entry_time ASC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_position(&r)).transpose()
    }

    pub async fn recent_trades(&self, n: i64) -> BotResult<Vec<Trade>> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY ts DESC LIMIT ?")
            .bind(n)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    pub async fn trades_by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BotResult<Vec<Trade>> {
        let rows = sqlx::query("SELECT * FROM trades WHERE ts >= ? AND ts <= ? ORDER BY ts ASC")
            .bind(start.to_rfc3339())
            .bind(end.to_rfc3339())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    pub async fn summary(&self) -> BotResult<LedgerSummary> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY ts ASC")
            .fetch_all(&self.pool)
            .await?;
        let trades: BotResult<Vec<Trade>> = rows.iter().map(Self::row_to_trade).collect();
        Ok(LedgerSummary::from_trades(&trades?))
    }

    fn row_to_trade(row: &sqlx::sqlite::SqliteRow) -> BotResult<Trade> {
        let side: String = row.try_get("side")?;
        let side = Side::from_str(&side).map_err(BotError::InvalidInput)?;
        let ts: String = row.try_get("ts")?;
        let ts = DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| BotError::StorageFailure(sqlx::Error::Decode(Box::new(e))))?
            .with_timezone(&Utc);

        let parse_dec = |s: &str| -> BotResult<Decimal> {
            Decimal::from_str(s).map_err(|e| BotError::InvalidInput(e.to_string()))
        };
        let parse_opt_dec = |s: Option<String>| -> BotResult<Option<Decimal>> {
            s.map(|s| parse_dec(&s)).transpose()
        };

        let quantity: String = row.try_get("quantity")?;
        let price: String = row.try_get("price")?;
        let total: String = row.try_get("total")?;
        let profit_loss: Option<String> = row.try_get("profit_loss")?;
        let profit_loss_percent: Option<String> = row.try_get("profit_loss_percent")?;

        Ok(Trade {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            side,
            quantity: parse_dec(&quantity)?,
            price: parse_dec(&price)?,
            total: parse_dec(&total)?,
            strategy: row.try_get("strategy")?,
            signal_reason: row.try_get("signal_reason")?,
            indicator_values_json: row.try_get("indicator_values_json")?,
            paper_trade: row.try_get("paper_trade")?,
            ts,
            exchange_order_id: row.try_get("exchange_order_id")?,
            profit_loss: parse_opt_dec(profit_loss)?,
            profit_loss_percent: parse_opt_dec(profit_loss_percent)?,
            related_buy_id: row.try_get("related_buy_id")?,
        })
    }

    fn row_to_position(row: &sqlx::sqlite::SqliteRow) -> BotResult<Position> {
        let parse_dec = |s: &str| -> BotResult<Decimal> {
            Decimal::from_str(s).map_err(|e| BotError::InvalidInput(e.to_string()))
        };
        let parse_opt_dec = |s: Option<String>| -> BotResult<Option<Decimal>> {
            s.map(|s| parse_dec(&s)).transpose()
        };
        let parse_ts = |s: &str| -> BotResult<DateTime<Utc>> {
            Ok(DateTime::parse_from_rfc3339(s)
                .map_err(|e| BotError::StorageFailure(sqlx::Error::Decode(Box::new(e))))?
                .with_timezone(&Utc))
        };

        let quantity: String = row.try_get("quantity")?;
        let entry_price: String = row.try_get("entry_price")?;
        let entry_time: String = row.try_get("entry_time")?;
        let exit_price: Option<String> = row.try_get("exit_price")?;
        let exit_time: Option<String> = row.try_get("exit_time")?;
        let profit_loss: Option<String> = row.try_get("profit_loss")?;
        let profit_loss_percent: Option<String> = row.try_get("profit_loss_percent")?;

        Ok(Position {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            quantity: parse_dec(&quantity)?,
            entry_price: parse_dec(&entry_price)?,
            entry_time: parse_ts(&entry_time)?,
            strategy: row.try_get("strategy")?,
            is_open: row.try_get("is_open")?,
            exit_price: parse_opt_dec(exit_price)?,
            exit_time: exit_time.map(|s| parse_ts(&s)).transpose()?,
            profit_loss: parse_opt_dec(profit_loss)?,
            profit_loss_percent: parse_opt_dec(profit_loss_percent)?,
            buy_trade_id: row.try_get("buy_trade_id")?,
            sell_trade_id: row.try_get("sell_trade_id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn open_ledger() -> Ledger {
        Ledger::open("sqlite::memory:").await.unwrap()
    }

    fn sample_trade(side: Side) -> Trade {
        Trade::new(
            "BTCUSDT",
            side,
            dec!(1),
            dec!(100),
            "rsi",
            "test",
            "{}",
            true,
            Utc::now(),
            None,
        )
    }

    #[tokio::test]
    async fn inserts_and_reads_back_a_trade() {
        let ledger = open_ledger().await;
        let id = ledger.insert_trade(&sample_trade(Side::Buy)).await.unwrap();
        assert!(id > 0);
        let recent = ledger.recent_trades(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn open_position_rejects_duplicate_open_symbol() {
        let ledger = open_ledger().await;
        let buy_id = ledger.insert_trade(&sample_trade(Side::Buy)).await.unwrap();
        let position = Position::open("BTCUSDT", dec!(1), dec!(100), Utc::now(), "rsi", buy_id);
        ledger.open_position(&position).await.unwrap();

        let dup = Position::open("BTCUSDT", dec!(1), dec!(100), Utc::now(), "rsi", buy_id);
        let result = ledger.open_position(&dup).await;
        assert!(matches!(result, Err(BotError::PositionAlreadyOpen { .. })));
    }

    #[tokio::test]
    async fn close_position_fails_when_not_open() {
        let ledger = open_ledger().await;
        let result = ledger
            .close_position(999, dec!(100), Utc::now(), dec!(0), dec!(0), 1)
            .await;
        assert!(matches!(result, Err(BotError::NotOpen { id: 999 })));
    }

    #[tokio::test]
    async fn recovers_open_position_ordered_by_entry_time() {
        let ledger = open_ledger().await;
        let buy_id = ledger.insert_trade(&sample_trade(Side::Buy)).await.unwrap();
        let position = Position::open("BTCUSDT", dec!(2), dec!(150), Utc::now(), "macd", buy_id);
        let pos_id = ledger.open_position(&position).await.unwrap();

        let recovered = ledger.find_open_position("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(recovered.id, pos_id);
        assert_eq!(recovered.quantity, dec!(2));
        assert_eq!(recovered.strategy, "macd");
    }
}
