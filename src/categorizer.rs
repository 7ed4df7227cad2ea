//! Expense auto-categorization.
//!
//! A user's learned correction patterns are consulted first; the static rule
//! table is only scored when no learned pattern qualifies. Scores are integer
//! percentages, so the same input always yields the same result.

use regex::{Regex, RegexBuilder};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{CoraError, Result};
use crate::models::{LearnedPattern, MatchKind, StaticRule};
use crate::settings::CategorizerConfig;

/// Score for a vendor that equals a vendor rule's pattern.
pub const EXACT_VENDOR_SCORE: u8 = 95;
const PARTIAL_VENDOR_BASE: i64 = 70;
const PARTIAL_VENDOR_SPAN: i64 = 20;
const KEYWORD_BASE: i64 = 45;
const KEYWORD_SPAN: i64 = 40;
const REGEX_SCORE: i64 = 65;
/// Largest adjustment a rule's weight may make, in either direction.
pub const MAX_RULE_WEIGHT: i64 = 20;
/// Weighted scores stay strictly below an exact vendor match.
const WEIGHTED_CAP: i64 = EXACT_VENDOR_SCORE as i64 - 1;

pub fn check_rule_weight(weight: i64) -> Result<()> {
    if !(-MAX_RULE_WEIGHT..=MAX_RULE_WEIGHT).contains(&weight) {
        return Err(CoraError::Other(format!(
            "Rule weight must be between -{MAX_RULE_WEIGHT} and {MAX_RULE_WEIGHT}, got {weight}"
        )));
    }
    Ok(())
}

/// Lowercase, drop apostrophes ("Lowe's" -> "lowes"), turn other
/// punctuation into spaces, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .filter(|&c| !matches!(c, '\'' | '\u{2019}' | '`'))
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word-aligned containment over normalized text: "rent" is not in "parent".
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() || haystack.is_empty() {
        return false;
    }
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

/// The key a user correction is recorded under: the normalized vendor, or
/// the normalized description when the vendor is blank.
pub fn correction_fragment(vendor: &str, description: &str) -> String {
    let v = normalize(vendor);
    if v.is_empty() {
        normalize(description)
    } else {
        v
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpenseInput<'a> {
    pub vendor: &'a str,
    pub description: &'a str,
    pub amount_cents: i64,
}

impl ExpenseInput<'_> {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(CoraError::InputValidation(
                "description is required".to_string(),
            ));
        }
        if self.amount_cents < 0 {
            return Err(CoraError::InputValidation(format!(
                "amount cannot be negative ({} cents)",
                self.amount_cents
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSource {
    Learned { fragment: String },
    Rule { rule_id: i64, pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    pub category_id: i64,
    pub confidence: u8,
    pub source: MatchSource,
}

struct CompiledRule<'a> {
    rule: &'a StaticRule,
    normalized: String,
    regex: Option<Regex>,
}

pub struct Categorizer<'a> {
    rules: Vec<CompiledRule<'a>>,
    learned: &'a [LearnedPattern],
    config: CategorizerConfig,
}

impl<'a> Categorizer<'a> {
    pub fn new(
        rules: &'a [StaticRule],
        learned: &'a [LearnedPattern],
        config: CategorizerConfig,
    ) -> Self {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = match rule.match_kind {
                    MatchKind::Regex => RegexBuilder::new(&rule.pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| warn!(rule_id = rule.id, error = %e, "skipping invalid rule regex"))
                        .ok(),
                    _ => None,
                };
                CompiledRule {
                    rule,
                    normalized: normalize(&rule.pattern),
                    regex,
                }
            })
            .collect();
        Self {
            rules,
            learned,
            config,
        }
    }

    /// Returns `Ok(None)` when nothing clears the confidence floor.
    pub fn categorize(&self, input: &ExpenseInput) -> Result<Option<CategoryMatch>> {
        input.validate()?;

        let vendor = normalize(input.vendor);
        let description = normalize(input.description);
        let text = normalize(&format!("{} {}", input.vendor, input.description));

        if let Some(m) = self.match_learned(&vendor, &description, &text) {
            debug!(category_id = m.category_id, confidence = m.confidence, "learned pattern match");
            return Ok(Some(m));
        }

        let raw = format!("{} {}", input.vendor, input.description);
        let mut best: Option<(u8, usize, &CompiledRule)> = None;
        for compiled in &self.rules {
            let Some(score) = score_rule(compiled, &vendor, &text, &raw) else {
                continue;
            };
            let len = compiled.normalized.len();
            let better = match best {
                None => true,
                Some((best_score, best_len, _)) => {
                    score > best_score || (score == best_score && len > best_len)
                }
            };
            if better {
                best = Some((score, len, compiled));
            }
        }

        match best {
            Some((score, _, compiled)) if score >= self.config.confidence_floor => {
                debug!(rule_id = compiled.rule.id, score, "rule match");
                Ok(Some(CategoryMatch {
                    category_id: compiled.rule.category_id,
                    confidence: score,
                    source: MatchSource::Rule {
                        rule_id: compiled.rule.id,
                        pattern: compiled.rule.pattern.clone(),
                    },
                }))
            }
            Some((score, _, compiled)) => {
                debug!(rule_id = compiled.rule.id, score, "best match below floor");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn match_learned(&self, vendor: &str, description: &str, text: &str) -> Option<CategoryMatch> {
        self.learned
            .iter()
            .filter(|p| {
                p.correction_count >= self.config.min_corrections
                    && p.confidence() >= self.config.learning_threshold
            })
            .filter_map(|p| {
                let exact = p.fragment == vendor || p.fragment == description;
                if exact || contains_phrase(text, &p.fragment) {
                    Some((exact, p))
                } else {
                    None
                }
            })
            // Ties fall to the lowest category id.
            .max_by(|(ea, a), (eb, b)| {
                ea.cmp(eb)
                    .then(a.fragment.len().cmp(&b.fragment.len()))
                    .then(a.confidence().cmp(&b.confidence()))
                    .then(a.correction_count.cmp(&b.correction_count))
                    .then(b.category_id.cmp(&a.category_id))
            })
            .map(|(_, p)| CategoryMatch {
                category_id: p.category_id,
                confidence: p.confidence(),
                source: MatchSource::Learned {
                    fragment: p.fragment.clone(),
                },
            })
    }
}

fn score_rule(compiled: &CompiledRule, vendor: &str, text: &str, raw: &str) -> Option<u8> {
    let pattern = compiled.normalized.as_str();
    let base = match compiled.rule.match_kind {
        MatchKind::Vendor => {
            if vendor.is_empty() || pattern.is_empty() {
                return None;
            }
            // Exact vendor matches ignore weights so they always clear the floor.
            if vendor == pattern {
                return Some(EXACT_VENDOR_SCORE);
            } else if contains_phrase(vendor, pattern) {
                PARTIAL_VENDOR_BASE + PARTIAL_VENDOR_SPAN * pattern.len() as i64 / vendor.len() as i64
            } else {
                return None;
            }
        }
        MatchKind::Keyword => {
            if !contains_phrase(text, pattern) {
                return None;
            }
            KEYWORD_BASE + KEYWORD_SPAN * pattern.len() as i64 / text.len() as i64
        }
        MatchKind::Regex => {
            let re = compiled.regex.as_ref()?;
            if !re.is_match(raw) {
                return None;
            }
            REGEX_SCORE
        }
    };
    let weight = compiled.rule.weight.clamp(-MAX_RULE_WEIGHT, MAX_RULE_WEIGHT);
    Some((base + weight).clamp(0, WEIGHTED_CAP) as u8)
}

// ---------------------------------------------------------------------------
// Store-backed operations
// ---------------------------------------------------------------------------

pub fn load_rules(conn: &Connection) -> Result<Vec<StaticRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, category_id, weight FROM rules \
         WHERE is_active = 1 ORDER BY id",
    )?;
    let rows: Vec<(i64, String, String, i64, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(rows.len());
    for (id, pattern, match_type, category_id, weight) in rows {
        let Some(match_kind) = MatchKind::from_key(&match_type) else {
            warn!(rule_id = id, match_type, "skipping rule with unknown match type");
            continue;
        };
        rules.push(StaticRule {
            id,
            pattern,
            match_kind,
            category_id,
            weight,
        });
    }
    Ok(rules)
}

pub fn load_learned_patterns(conn: &Connection, user_id: i64) -> Result<Vec<LearnedPattern>> {
    let mut stmt = conn.prepare(
        "SELECT p.fragment, p.category_id, p.correction_count, t.total \
         FROM user_correction_patterns p \
         JOIN (SELECT fragment, SUM(correction_count) AS total \
               FROM user_correction_patterns WHERE user_id = ?1 GROUP BY fragment) t \
           ON t.fragment = p.fragment \
         WHERE p.user_id = ?1 \
         ORDER BY p.fragment, p.category_id",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(LearnedPattern {
                fragment: row.get(0)?,
                category_id: row.get(1)?,
                correction_count: row.get(2)?,
                fragment_total: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn apply_match(conn: &Connection, expense_id: i64, result: Option<&CategoryMatch>) -> Result<()> {
    match result {
        Some(m) => {
            conn.execute(
                "UPDATE expenses SET category_id = ?1, confidence_score = ?2, auto_categorized = 1, \
                 updated_at = datetime('now') WHERE id = ?3",
                rusqlite::params![m.category_id, m.confidence, expense_id],
            )?;
            if let MatchSource::Rule { rule_id, .. } = &m.source {
                conn.execute(
                    "UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1",
                    [rule_id],
                )?;
            }
        }
        None => {
            conn.execute(
                "UPDATE expenses SET category_id = NULL, confidence_score = NULL, auto_categorized = 0, \
                 updated_at = datetime('now') WHERE id = ?1",
                [expense_id],
            )?;
        }
    }
    Ok(())
}

/// Categorize one stored expense and write the result onto its row.
/// Expenses whose category was confirmed by the user are left untouched and
/// yield `None`.
pub fn categorize_expense(
    conn: &Connection,
    user_id: i64,
    expense_id: i64,
    config: &CategorizerConfig,
) -> Result<Option<CategoryMatch>> {
    let row: Option<(String, String, i64, Option<i64>, bool)> = conn
        .query_row(
            "SELECT vendor, description, amount_cents, category_id, auto_categorized \
             FROM expenses WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![expense_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    let (vendor, description, amount_cents, category_id, auto) =
        row.ok_or(CoraError::UnknownExpense(expense_id))?;

    if category_id.is_some() && !auto {
        debug!(expense_id, "user-confirmed category, not recategorizing");
        return Ok(None);
    }

    let rules = load_rules(conn)?;
    let learned = load_learned_patterns(conn, user_id)?;
    let categorizer = Categorizer::new(&rules, &learned, *config);
    let result = categorizer.categorize(&ExpenseInput {
        vendor: &vendor,
        description: &description,
        amount_cents,
    })?;
    apply_match(conn, expense_id, result.as_ref())?;
    Ok(result)
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_uncategorized: usize,
}

/// Re-run the categorizer over every uncategorized expense of a user.
pub fn categorize_uncategorized(
    conn: &Connection,
    user_id: i64,
    config: &CategorizerConfig,
) -> Result<CategorizeResult> {
    let rules = load_rules(conn)?;
    let learned = load_learned_patterns(conn, user_id)?;
    let categorizer = Categorizer::new(&rules, &learned, *config);

    let pending: Vec<(i64, String, String, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT id, vendor, description, amount_cents FROM expenses \
             WHERE user_id = ?1 AND category_id IS NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let tx = conn.unchecked_transaction()?;
    let mut categorized = 0usize;
    let mut still_uncategorized = 0usize;
    for (expense_id, vendor, description, amount_cents) in &pending {
        let result = categorizer.categorize(&ExpenseInput {
            vendor,
            description,
            amount_cents: *amount_cents,
        })?;
        if result.is_some() {
            categorized += 1;
        } else {
            still_uncategorized += 1;
        }
        apply_match(&tx, *expense_id, result.as_ref())?;
    }
    tx.commit()?;

    Ok(CategorizeResult {
        categorized,
        still_uncategorized,
    })
}
