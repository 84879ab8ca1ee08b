use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Commission bracket of an account. Doubles as the seller tier: the four
/// ladder roles (basic..elite) are earned through sales volume, while
/// `free` and `admin` are hand-assigned and exempt from commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Basic,
    Pro,
    Premium,
    Elite,
    Free,
    Admin,
}

impl Role {
    /// Position in the upgrade order. Ladder roles rank 0..=3; `free` and
    /// `admin` rank above the ladder so the automatic tier computation can
    /// never overwrite them.
    pub fn rank(self) -> u8 {
        match self {
            Role::Basic => 0,
            Role::Pro => 1,
            Role::Premium => 2,
            Role::Elite => 3,
            Role::Free => 10,
            Role::Admin => 11,
        }
    }

    pub fn is_commission_exempt(self) -> bool {
        matches!(self, Role::Free | Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Basic => "basic",
            Role::Pro => "pro",
            Role::Premium => "premium",
            Role::Elite => "elite",
            Role::Free => "free",
            Role::Admin => "admin",
        }
    }

    /// Boundary parser. Unknown role strings fall back to the lowest
    /// (highest-fee) bracket instead of failing, so a bad value can never
    /// grant a commission-free sale. "ultra premium" is a legacy alias for
    /// the free bracket.
    pub fn parse_or_lowest(s: &str) -> Role {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Role::Basic,
            "pro" => Role::Pro,
            "premium" => Role::Premium,
            "elite" => Role::Elite,
            "free" | "ultra premium" | "ultra_premium" => Role::Free,
            "admin" => Role::Admin,
            _ => Role::Basic,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub rut: Option<String>,
    pub role: Role,
    pub trust_score: i32,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProfileData {
    pub display_name: String,
    pub email: String,
    pub rut: Option<String>,
    pub role: Option<Role>,
}

impl Profile {
    /// Creates a profile. Called from the provisioning hook the external
    /// identity provider invokes at signup.
    pub async fn create(pool: &PgPool, data: CreateProfileData) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO profiles (display_name, email, rut, role)
            VALUES ($1, $2, $3, COALESCE($4, 'basic'))
            RETURNING *
            "#,
        )
        .bind(&data.display_name)
        .bind(&data.email)
        .bind(&data.rut)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(profile)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM profiles WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Rank-guarded tier update: the new role is applied only when it ranks
    /// strictly above the stored one, so concurrent recomputations can only
    /// move a seller upward. `free` and `admin` hold an out-of-ladder rank
    /// (ELSE 99) and are never overwritten. Returns true when the upgrade
    /// was applied.
    pub async fn promote_role(
        exec: impl PgExecutor<'_>,
        id: Uuid,
        new_role: Role,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET role = $2, updated_at = NOW()
            WHERE id = $1
              AND (CASE role
                     WHEN 'basic' THEN 0
                     WHEN 'pro' THEN 1
                     WHEN 'premium' THEN 2
                     WHEN 'elite' THEN 3
                     ELSE 99
                   END)
                < (CASE $2::user_role
                     WHEN 'basic' THEN 0
                     WHEN 'pro' THEN 1
                     WHEN 'premium' THEN 2
                     WHEN 'elite' THEN 3
                     ELSE -1
                   END)
            "#,
        )
        .bind(id)
        .bind(new_role)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_blocked(
        pool: &PgPool,
        id: Uuid,
        is_blocked: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET is_blocked = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(is_blocked)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Knocks points off the trust score when a fraud signal fires. The
    /// account is flagged for admin review, never auto-banned.
    pub async fn penalize_trust(
        pool: &PgPool,
        id: Uuid,
        points: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET trust_score = GREATEST(trust_score - $2, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(points)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_roles() {
        assert_eq!(Role::parse_or_lowest("basic"), Role::Basic);
        assert_eq!(Role::parse_or_lowest("pro"), Role::Pro);
        assert_eq!(Role::parse_or_lowest("premium"), Role::Premium);
        assert_eq!(Role::parse_or_lowest("elite"), Role::Elite);
        assert_eq!(Role::parse_or_lowest("free"), Role::Free);
        assert_eq!(Role::parse_or_lowest("admin"), Role::Admin);
    }

    #[test]
    fn test_parse_tolerates_case_whitespace_and_legacy_aliases() {
        assert_eq!(Role::parse_or_lowest(" Premium "), Role::Premium);
        assert_eq!(Role::parse_or_lowest("ELITE"), Role::Elite);
        assert_eq!(Role::parse_or_lowest("ultra premium"), Role::Free);
        assert_eq!(Role::parse_or_lowest("ultra_premium"), Role::Free);
    }

    #[test]
    fn test_unknown_strings_land_on_the_highest_fee_bracket() {
        assert_eq!(Role::parse_or_lowest("vip"), Role::Basic);
        assert_eq!(Role::parse_or_lowest("platinum"), Role::Basic);
        assert_eq!(Role::parse_or_lowest(""), Role::Basic);
    }

    #[test]
    fn test_ladder_ranks_below_hand_assigned_roles() {
        assert!(Role::Basic.rank() < Role::Pro.rank());
        assert!(Role::Pro.rank() < Role::Premium.rank());
        assert!(Role::Premium.rank() < Role::Elite.rank());
        assert!(Role::Elite.rank() < Role::Free.rank());
        assert!(Role::Free.rank() < Role::Admin.rank());
    }
}
