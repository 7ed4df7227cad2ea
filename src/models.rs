#[derive(Debug, Clone)]
pub struct ExpenseCategory {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
}

/// How an expense entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseSource {
    Manual,
    Receipt,
    BankImport,
}

impl ExpenseSource {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Receipt => "receipt",
            Self::BankImport => "bank_import",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "manual" => Some(Self::Manual),
            "receipt" => Some(Self::Receipt),
            "bank_import" => Some(Self::BankImport),
            _ => None,
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub vendor: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub confidence_score: Option<u8>,
    pub auto_categorized: bool,
    pub job_name: Option<String>,
    pub expense_date: String,
    pub source: ExpenseSource,
    pub created_at: String,
    pub updated_at: String,
}

/// Which text a static rule is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Vendor,
    Keyword,
    Regex,
}

impl MatchKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Keyword => "keyword",
            Self::Regex => "regex",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "vendor" => Some(Self::Vendor),
            "keyword" => Some(Self::Keyword),
            "regex" => Some(Self::Regex),
            _ => None,
        }
    }
}

/// One entry of the static rule table: (pattern, category, weight).
#[derive(Debug, Clone)]
pub struct StaticRule {
    pub id: i64,
    pub pattern: String,
    pub match_kind: MatchKind,
    pub category_id: i64,
    pub weight: i64,
}

/// Per-user correction tally for one (fragment, category) pair, with the
/// fragment's total across all categories so confidence can be derived.
#[derive(Debug, Clone)]
pub struct LearnedPattern {
    pub fragment: String,
    pub category_id: i64,
    pub correction_count: i64,
    pub fragment_total: i64,
}

impl LearnedPattern {
    /// Share of this fragment's corrections that went to `category_id`, 0-100.
    pub fn confidence(&self) -> u8 {
        if self.fragment_total <= 0 {
            return 0;
        }
        let pct = self.correction_count.saturating_mul(100) / self.fragment_total;
        pct.clamp(0, 100) as u8
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub quoted_amount_cents: i64,
}

/// Intermediate representation from the CSV parser before insert.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub date: String,
    pub vendor: String,
    pub description: String,
    pub amount_cents: i64,
    pub job_name: Option<String>,
}
