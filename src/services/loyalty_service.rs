use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AdjustPointsRequest, LoyaltySummary, LoyaltyTransaction, LoyaltyTransactionType};

const RECENT_TRANSACTIONS: i64 = 20;

#[derive(Clone)]
pub struct LoyaltyService {
    db: PgPool,
}

impl LoyaltyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply a signed point change and append it to the ledger.
    /// The balance update is conditional so it can never go below zero.
    pub async fn record(
        conn: &mut PgConnection,
        member_id: Uuid,
        points: i64,
        kind: LoyaltyTransactionType,
        reason: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<i64> {
        if points == 0 {
            return Err(AppError::validation("Point change must be non-zero"));
        }

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE member_profiles
             SET loyalty_points = loyalty_points + $2, updated_at = NOW()
             WHERE user_id = $1 AND loyalty_points + $2 >= 0
             RETURNING loyalty_points",
        )
        .bind(member_id)
        .bind(points)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(balance) = balance else {
            let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM member_profiles WHERE user_id = $1")
                .bind(member_id)
                .fetch_optional(&mut *conn)
                .await?;
            return Err(match exists {
                Some(_) => AppError::validation("Insufficient loyalty points"),
                None => AppError::not_found(format!("Member {member_id} not found")),
            });
        };

        sqlx::query(
            "INSERT INTO loyalty_transactions (member_id, points, transaction_type, reason, reference_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(member_id)
        .bind(points)
        .bind(kind)
        .bind(reason)
        .bind(reference_id)
        .execute(&mut *conn)
        .await?;

        Ok(balance)
    }

    /// Deduct up to `points`, stopping at a zero balance. Returns what was taken.
    pub async fn debit_capped(
        conn: &mut PgConnection,
        member_id: Uuid,
        points: i64,
        reason: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT loyalty_points FROM member_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Member {member_id} not found")))?;

        let taken = points.min(balance);
        if taken > 0 {
            Self::record(conn, member_id, -taken, LoyaltyTransactionType::Adjusted, reason, reference_id)
                .await?;
        }
        Ok(taken)
    }

    pub async fn summary(&self, member_id: Uuid) -> AppResult<LoyaltySummary> {
        let balance: i64 = sqlx::query_scalar("SELECT loyalty_points FROM member_profiles WHERE user_id = $1")
            .bind(member_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Member {member_id} not found")))?;

        let recent_transactions = sqlx::query_as::<_, LoyaltyTransaction>(
            "SELECT id, member_id, points, transaction_type, reason, reference_id, created_at
             FROM loyalty_transactions
             WHERE member_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(member_id)
        .bind(RECENT_TRANSACTIONS)
        .fetch_all(&self.db)
        .await?;

        Ok(LoyaltySummary {
            member_id,
            balance,
            recent_transactions,
        })
    }

    /// Manual correction by an admin
    pub async fn adjust(&self, request: AdjustPointsRequest) -> AppResult<LoyaltySummary> {
        request.validate()?;

        let mut tx = self.db.begin().await?;
        let balance = Self::record(
            &mut *tx,
            request.member_id,
            request.points,
            LoyaltyTransactionType::Adjusted,
            request.reason.trim(),
            None,
        )
        .await?;
        tx.commit().await?;

        info!(member_id = %request.member_id, points = request.points, balance, "adjusted loyalty points");
        self.summary(request.member_id).await
    }
}
