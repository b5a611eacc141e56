use serde::{Deserialize, Serialize};

/// Sentinel credit value meaning "no limit".
pub const UNLIMITED_CREDITS: i32 = -1;

/// Subscription tier controlling the monthly analysis allotment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Plan {
    #[default]
    #[serde(rename = "Free Plan")]
    Free,
    #[serde(rename = "Pro Plan")]
    Pro,
    #[serde(rename = "Enterprise Plan")]
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Pro, Plan::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "Free Plan",
            Plan::Pro => "Pro Plan",
            Plan::Enterprise => "Enterprise Plan",
        }
    }

    /// Credits granted per billing period. This is the only allotment table;
    /// every code path that refills credits reads it from here.
    pub fn allotment(&self) -> i32 {
        match self {
            Plan::Free => 3,
            Plan::Pro => 25,
            Plan::Enterprise => UNLIMITED_CREDITS,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.allotment() == UNLIMITED_CREDITS
    }

    /// Whether the plan is billed through the payment ledger.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    /// Lenient parse of stored or externally declared plan names.
    ///
    /// Accepts the display names plus the short aliases that older records
    /// and checkout metadata used (`"Enterprise"`, `"infinite"`, `"pro"`).
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Plan::ALL
            .into_iter()
            .find(|plan| plan.spellings().contains(&wanted.as_str()))
    }

    /// Lowercased names a stored or declared plan may use.
    pub fn spellings(&self) -> &'static [&'static str] {
        match self {
            Plan::Free => &["free plan", "free"],
            Plan::Pro => &["pro plan", "pro"],
            Plan::Enterprise => &["enterprise plan", "enterprise", "infinite"],
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::parse(s).ok_or_else(|| format!("Unknown plan: {}", s))
    }
}
