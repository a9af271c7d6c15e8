use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use tally_common::MinorUnits;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------      ValueKind       --------------------------------------------------------
/// The value-kind discriminator for accounts and packages. Connects are spent by freelancers on proposals; credits
/// are spent by clients on contracts. Functionally identical ledgers with different purchase catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ValueKind {
    Connects,
    Credits,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Connects => write!(f, "Connects"),
            ValueKind::Credits => write!(f, "Credits"),
        }
    }
}

impl FromStr for ValueKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Connects" => Ok(Self::Connects),
            "Credits" => Ok(Self::Credits),
            s => Err(ConversionError(format!("Invalid value kind: {s}"))),
        }
    }
}

//--------------------------------------      EntryKind       --------------------------------------------------------
/// The kind of a ledger entry. The kind, together with the signed amount, fully determines the entry's effect on the
/// account's `available` and `on_hold` balances (see [`EntryKind::balance_effect`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryKind {
    /// Value bought through the payment gateway. Credited to `available`.
    Purchased,
    /// Value released to a freelancer from a settled contract. Credited to `available`.
    Earned,
    /// Value spent (e.g. connects redeemed against a proposal). Debited from `available`.
    Used,
    /// Value moved from `available` to `on_hold` when a contract activates.
    Held,
    /// Held value leaving the client account at settlement. Debited from `on_hold`.
    Released,
    /// Held value returned to the client's `available` balance.
    Refunded,
}

impl EntryKind {
    /// The `(available, on_hold)` deltas this entry applies. `Held` and `Refunded` are bucket moves and leave the
    /// account total unchanged; everything else changes the total by `amount`.
    pub fn balance_effect(&self, amount: MinorUnits) -> (MinorUnits, MinorUnits) {
        match self {
            EntryKind::Purchased | EntryKind::Earned | EntryKind::Used => (amount, MinorUnits::from(0)),
            EntryKind::Held | EntryKind::Refunded => (amount, -amount),
            EntryKind::Released => (MinorUnits::from(0), amount),
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryKind::Purchased => "Purchased",
            EntryKind::Earned => "Earned",
            EntryKind::Used => "Used",
            EntryKind::Held => "Held",
            EntryKind::Released => "Released",
            EntryKind::Refunded => "Refunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntryKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Purchased" => Ok(Self::Purchased),
            "Earned" => Ok(Self::Earned),
            "Used" => Ok(Self::Used),
            "Held" => Ok(Self::Held),
            "Released" => Ok(Self::Released),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid entry kind: {s}"))),
        }
    }
}

//--------------------------------------     EntryStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Placeholder, e.g. a purchase session that has not been paid yet. Carries a zero amount.
    Pending,
    /// The entry has been applied to the account balances. Immutable.
    Active,
    /// An escrow hold that has not been settled yet.
    OnHold,
    /// A settled escrow entry. Immutable.
    Completed,
    /// The entry never took effect (failed or expired purchase). Excluded from all balance math.
    Failed,
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryStatus::Pending => "Pending",
            EntryStatus::Active => "Active",
            EntryStatus::OnHold => "OnHold",
            EntryStatus::Completed => "Completed",
            EntryStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Active" => Ok(Self::Active),
            "OnHold" => Ok(Self::OnHold),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid entry status: {s}"))),
        }
    }
}

//--------------------------------------       Account        --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i64,
    /// The user id as assigned by the identity collaborator. Opaque to the ledger.
    pub owner_id: String,
    pub kind: ValueKind,
    pub available: MinorUnits,
    pub on_hold: MinorUnits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn balance(&self) -> Balance {
        Balance { available: self.available, on_hold: self.on_hold }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: MinorUnits,
    pub on_hold: MinorUnits,
}

//--------------------------------------     LedgerEntry      --------------------------------------------------------
/// A single append-only ledger entry. Once `Active` or `Completed`, an entry is never mutated; corrections are made
/// by appending an offsetting entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub amount: MinorUnits,
    pub kind: EntryKind,
    pub status: EntryStatus,
    /// Contract id, purchase session reference, or none. Exactly-once kinds are unique on `(kind, source_ref)`.
    pub source_ref: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub amount: MinorUnits,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub source_ref: Option<String>,
    pub description: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(account_id: i64, amount: MinorUnits, kind: EntryKind, status: EntryStatus) -> Self {
        Self { account_id, amount, kind, status, source_ref: None, description: None }
    }

    pub fn with_source_ref<S: Into<String>>(mut self, source_ref: S) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

//--------------------------------------       Package        --------------------------------------------------------
/// A purchasable value bundle. Read-only to the ledger engine; the administrative write path lives elsewhere.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub name: String,
    pub kind: ValueKind,
    /// The value credited to the buyer's account when the purchase confirms.
    pub amount: MinorUnits,
    /// The price charged by the payment gateway, in minor units of `currency`.
    pub price: MinorUnits,
    pub currency: String,
    pub active: bool,
}

//--------------------------------------    SessionStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SessionStatus {
    Created,
    AwaitingConfirmation,
    Confirmed,
    Expired,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Confirmed | SessionStatus::Expired | SessionStatus::Failed)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Created => "Created",
            SessionStatus::AwaitingConfirmation => "AwaitingConfirmation",
            SessionStatus::Confirmed => "Confirmed",
            SessionStatus::Expired => "Expired",
            SessionStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SessionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "AwaitingConfirmation" => Ok(Self::AwaitingConfirmation),
            "Confirmed" => Ok(Self::Confirmed),
            "Expired" => Ok(Self::Expired),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid session status: {s}"))),
        }
    }
}

//--------------------------------------   PurchaseSession    --------------------------------------------------------
/// Bridges one checkout attempt against the external payment gateway to a ledger entry. The `external_ref` is the
/// globally unique idempotency key shared with the gateway.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PurchaseSession {
    pub id: i64,
    pub account_id: i64,
    pub package_id: i64,
    pub external_ref: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      ContractId      --------------------------------------------------------
/// The contract id as assigned by the contract CRUD collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ContractId(pub String);

impl FromStr for ContractId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for ContractId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ContractId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   ContractStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ContractStatus {
    Pending,
    FreelancerAccepted,
    ClientAccepted,
    Active,
    Completed,
    Cancelled,
    UnderAdminReview,
}

impl Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContractStatus::Pending => "Pending",
            ContractStatus::FreelancerAccepted => "FreelancerAccepted",
            ContractStatus::ClientAccepted => "ClientAccepted",
            ContractStatus::Active => "Active",
            ContractStatus::Completed => "Completed",
            ContractStatus::Cancelled => "Cancelled",
            ContractStatus::UnderAdminReview => "UnderAdminReview",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ContractStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "FreelancerAccepted" => Ok(Self::FreelancerAccepted),
            "ClientAccepted" => Ok(Self::ClientAccepted),
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "UnderAdminReview" => Ok(Self::UnderAdminReview),
            s => Err(ConversionError(format!("Invalid contract status: {s}"))),
        }
    }
}

//--------------------------------------       Contract       --------------------------------------------------------
/// The escrow-relevant view of a contract. Existence, party identities and amount come from the contract CRUD
/// collaborator; the engine only tracks the lifecycle state it needs to enforce escrow invariants.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contract {
    pub contract_id: ContractId,
    pub client_account_id: i64,
    pub freelancer_account_id: i64,
    pub amount: MinorUnits,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
    pub contract_id: ContractId,
    pub client_account_id: i64,
    pub freelancer_account_id: i64,
    pub amount: MinorUnits,
}

//--------------------------------------    ContractEvent     --------------------------------------------------------
/// Lifecycle events the contract CRUD collaborator feeds into [`crate::ContractFlowApi::transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContractEvent {
    AcceptedByFreelancer,
    AcceptedByClient,
    Complete,
    Cancel,
    OpenAdminReview,
    ResolveSplit { freelancer_share: MinorUnits, client_share: MinorUnits },
}

impl Display for ContractEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractEvent::AcceptedByFreelancer => write!(f, "AcceptedByFreelancer"),
            ContractEvent::AcceptedByClient => write!(f, "AcceptedByClient"),
            ContractEvent::Complete => write!(f, "Complete"),
            ContractEvent::Cancel => write!(f, "Cancel"),
            ContractEvent::OpenAdminReview => write!(f, "OpenAdminReview"),
            ContractEvent::ResolveSplit { freelancer_share, client_share } => {
                write!(f, "ResolveSplit({freelancer_share}/{client_share})")
            },
        }
    }
}
