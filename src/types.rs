// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Compensation Engine - Core Types
//
// Identifiers, the rank ladder, and the decimal point/money denominations
// shared by every analysis.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Distributor identifier (`id_customers` on the wire).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributorId(pub u64);

impl fmt::Display for DistributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DistributorId {
    fn from(v: u64) -> Self { DistributorId(v) }
}

/// Compensation period identifier (`id_period` on the wire).
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(pub u64);

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PeriodId {
    fn from(v: u64) -> Self { PeriodId(v) }
}

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// Career rank ladder, ordered from entry level upwards.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Rank {
    Distribuidor = 0,
    Bronce = 1,
    Plata = 2,
    Oro = 3,
    Platino = 4,
    Diamante = 5,
    DobleDiamante = 6,
    TripleDiamante = 7,
    Sirius = 8,
}

impl Default for Rank {
    fn default() -> Self { Rank::Distribuidor }
}

impl Rank {
    pub const ALL: [Rank; 9] = [
        Rank::Distribuidor,
        Rank::Bronce,
        Rank::Plata,
        Rank::Oro,
        Rank::Platino,
        Rank::Diamante,
        Rank::DobleDiamante,
        Rank::TripleDiamante,
        Rank::Sirius,
    ];

    /// Plata and above create a generation cut for everyone below them.
    pub fn is_plata_plus(&self) -> bool {
        *self >= Rank::Plata
    }

    /// Plan name as shown to users (`name_plan`).
    pub fn plan_name(&self) -> &'static str {
        match self {
            Self::Distribuidor => "Distribuidor",
            Self::Bronce => "Bronce",
            Self::Plata => "Plata",
            Self::Oro => "Oro",
            Self::Platino => "Platino",
            Self::Diamante => "Diamante",
            Self::DobleDiamante => "Doble Diamante",
            Self::TripleDiamante => "Triple Diamante",
            Self::Sirius => "Sirius",
        }
    }

    /// Parse a plan name as stored by the data source.
    ///
    /// Matching ignores case, accents and separators; "Azul" is the legacy
    /// name of Sirius. Returns `None` for names outside the ladder.
    pub fn from_plan_name(name: &str) -> Option<Rank> {
        let key: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        let rank = match key.as_str() {
            "distribuidor" | "distributor" => Self::Distribuidor,
            "bronce" | "bronze" => Self::Bronce,
            "plata" | "silver" => Self::Plata,
            "oro" | "gold" => Self::Oro,
            "platino" | "platinum" => Self::Platino,
            "diamante" | "diamond" => Self::Diamante,
            "doblediamante" | "doublediamond" => Self::DobleDiamante,
            "triplediamante" | "triplediamond" => Self::TripleDiamante,
            "sirius" | "azul" => Self::Sirius,
            _ => return None,
        };
        Some(rank)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plan_name())
    }
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Period-scoped point volume backed by `rust_decimal::Decimal`.
///
/// Source volumes are whole numbers; scaled volumes (simulations) may carry
/// fractional points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Points(pub Decimal);

impl Points {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn new(v: u64) -> Self {
        Self(Decimal::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Commission earned on these points at `rate_pct` percent.
    pub fn at_rate(&self, rate_pct: Decimal) -> Money {
        Money(self.0 * rate_pct / dec!(100))
    }
}

impl Add for Points {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Points {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Points {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Points::zero(), Add::add)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pts", self.0)
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Commission amount in the period's currency, full precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.round_dp(2))
    }
}

// ---------------------------------------------------------------------------
// Percentages
// ---------------------------------------------------------------------------

/// `part / whole × 100` rounded to two places; zero when `whole` is zero.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_pct(part / whole * dec!(100))
}

/// Wire rounding for percentages.
pub fn round_pct(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// A compensation period (`Period` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id_period: PeriodId,
    pub name_period: String,
    /// ISO-8601 date; lexical order is chronological order.
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}

// ---------------------------------------------------------------------------
// DistributorRecord
// ---------------------------------------------------------------------------

/// One row of the period-scoped distributor/sponsorship/points source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorRecord {
    pub id_customers: DistributorId,
    pub full_name: String,
    pub id_sponsor: Option<DistributorId>,
    /// Raw plan name; `None` or an unknown name defaults to the lowest rank.
    #[serde(default)]
    pub name_plan: Option<String>,
    #[serde(default)]
    pub point_current_customers: Points,
    #[serde(default)]
    pub point_business_customers: Points,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_ordering_follows_ladder() {
        assert!(Rank::Distribuidor < Rank::Bronce);
        assert!(Rank::Bronce < Rank::Plata);
        assert!(Rank::TripleDiamante < Rank::Sirius);
        assert!(!Rank::Bronce.is_plata_plus());
        assert!(Rank::Plata.is_plata_plus());
        assert!(Rank::Sirius.is_plata_plus());
    }

    #[test]
    fn plan_names_parse_loosely() {
        assert_eq!(Rank::from_plan_name("PLATA"), Some(Rank::Plata));
        assert_eq!(Rank::from_plan_name("Doble Diamante"), Some(Rank::DobleDiamante));
        assert_eq!(Rank::from_plan_name("triple-diamante"), Some(Rank::TripleDiamante));
        assert_eq!(Rank::from_plan_name("Azul"), Some(Rank::Sirius));
        assert_eq!(Rank::from_plan_name("Esmeralda"), None);
        for rank in Rank::ALL {
            assert_eq!(Rank::from_plan_name(rank.plan_name()), Some(rank));
        }
    }

    #[test]
    fn points_at_rate() {
        let pts = Points::new(1000);
        assert_eq!(pts.at_rate(dec!(4)), Money(dec!(40)));
        assert_eq!(pts.at_rate(dec!(0)), Money::zero());
    }

    #[test]
    fn percentage_of_zero_whole_is_zero() {
        assert_eq!(percentage_of(dec!(5), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_of(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(percentage_of(dec!(2), dec!(3)), dec!(66.67));
    }

    #[test]
    fn record_defaults_missing_fields() {
        let json = r#"{"id_customers": 7, "full_name": "Ana", "id_sponsor": null}"#;
        let rec: DistributorRecord = serde_json::from_str(json).expect("test: parse record");
        assert_eq!(rec.id_customers, DistributorId(7));
        assert!(rec.name_plan.is_none());
        assert!(rec.point_business_customers.is_zero());
    }
}
