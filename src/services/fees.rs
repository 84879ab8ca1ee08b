use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::Role;

/// Commission bracket for one seller role. Rates apply to the listing price;
/// amounts are whole Chilean pesos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub rate: Decimal,
    pub minimum: Decimal,
}

pub fn schedule_for(role: Role) -> FeeSchedule {
    match role {
        Role::Basic => FeeSchedule {
            rate: Decimal::new(35, 3),
            minimum: Decimal::from(1200),
        },
        Role::Pro => FeeSchedule {
            rate: Decimal::new(25, 3),
            minimum: Decimal::from(900),
        },
        Role::Premium => FeeSchedule {
            rate: Decimal::new(15, 3),
            minimum: Decimal::from(600),
        },
        Role::Elite => FeeSchedule {
            rate: Decimal::new(5, 3),
            minimum: Decimal::from(300),
        },
        Role::Free | Role::Admin => FeeSchedule {
            rate: Decimal::ZERO,
            minimum: Decimal::ZERO,
        },
    }
}

/// Commission charged on a sale at the given price. The percentage is
/// rounded to whole pesos (midpoint away from zero), then floored at the
/// bracket minimum and capped at the price itself. Never negative.
pub fn seller_fee(price: Decimal, role: Role) -> Decimal {
    if role.is_commission_exempt() {
        return Decimal::ZERO;
    }

    let schedule = schedule_for(role);
    let percentage = (price * schedule.rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    percentage
        .max(schedule.minimum)
        .min(price)
        .max(Decimal::ZERO)
}

/// What the seller is credited for a sale at the given price.
pub fn seller_payout(price: Decimal, role: Role) -> Decimal {
    price - seller_fee(price, role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percentage_applies_above_the_minimum() {
        assert_eq!(seller_fee(dec!(100000), Role::Basic), dec!(3500));
        assert_eq!(seller_fee(dec!(100000), Role::Pro), dec!(2500));
        assert_eq!(seller_fee(dec!(100000), Role::Premium), dec!(1500));
        assert_eq!(seller_fee(dec!(100000), Role::Elite), dec!(500));
    }

    #[test]
    fn test_minimum_kicks_in_on_cheap_tickets() {
        // 3.5% of 10_000 is 350, below the 1_200 floor.
        assert_eq!(seller_fee(dec!(10000), Role::Basic), dec!(1200));
        // 0.5% of 20_000 is 100, below the 300 floor.
        assert_eq!(seller_fee(dec!(20000), Role::Elite), dec!(300));
    }

    #[test]
    fn test_fee_never_exceeds_the_price() {
        assert_eq!(seller_fee(dec!(500), Role::Basic), dec!(500));
        assert_eq!(seller_payout(dec!(500), Role::Basic), dec!(0));
    }

    #[test]
    fn test_exempt_roles_pay_nothing() {
        assert_eq!(seller_fee(dec!(100000), Role::Free), dec!(0));
        assert_eq!(seller_fee(dec!(100000), Role::Admin), dec!(0));
        assert_eq!(seller_payout(dec!(100000), Role::Free), dec!(100000));
    }

    #[test]
    fn test_rounds_to_whole_pesos_midpoint_away_from_zero() {
        // 3.5% of 33_300 is 1_165.5.
        assert_eq!(seller_fee(dec!(33300), Role::Basic), dec!(1166));
        // 3.5% of 33_333 is 1_166.655.
        assert_eq!(seller_fee(dec!(33333), Role::Basic), dec!(1167));
    }

    #[test]
    fn test_payout_plus_fee_reconstructs_the_price() {
        for price in [dec!(500), dec!(10000), dec!(33333), dec!(100000)] {
            for role in [Role::Basic, Role::Pro, Role::Premium, Role::Elite, Role::Free] {
                assert_eq!(seller_fee(price, role) + seller_payout(price, role), price);
            }
        }
    }

    #[test]
    fn test_unknown_role_strings_fall_back_to_the_basic_schedule() {
        let role = Role::parse_or_lowest("vip_gold");
        assert_eq!(seller_fee(dec!(100000), role), dec!(3500));
    }
}
