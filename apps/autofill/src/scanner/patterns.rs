//! Field-type pattern table and evidence scoring.
//!
//! Classification is a pure function of a [`SignalSet`]: every rule in
//! [`FIELD_PATTERNS`] is evaluated against every signal, the strongest hit per
//! signal is kept, and hits from distinct signals are combined with noisy-OR:
//!
//! ```text
//! confidence = 1 - Π (1 - w_signal)
//! ```
//!
//! Descriptor hits (label, name, id, ...) are discounted by how much that
//! signal usually tells us. A placeholder alone can never reach 0.5, while an
//! `autocomplete` token alone clears 0.8.

use crate::models::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    /// The control's `autocomplete` field token (`given-name`, `email`, ...).
    Autocomplete,
    /// The `<input type>`.
    InputType,
    /// Any free-text hint: label, aria-label, name, id, placeholder, nearby text.
    Descriptor,
}

/// Matchers run against normalized text (see [`normalize`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Whole text equals the pattern.
    Exact(&'static str),
    /// Pattern appears on word boundaries.
    Phrase(&'static str),
    /// Pattern appears anywhere, even inside a word.
    Substring(&'static str),
}

impl Matcher {
    pub fn matches(&self, normalized: &str) -> bool {
        match *self {
            Matcher::Exact(p) => normalized == p,
            Matcher::Phrase(p) => format!(" {normalized} ").contains(&format!(" {p} ")),
            Matcher::Substring(p) => normalized.replace(' ', "").contains(&p.replace(' ', "")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub source: SignalSource,
    pub matcher: Matcher,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldPattern {
    pub field_type: FieldType,
    pub rules: &'static [PatternRule],
}

const fn ac(token: &'static str) -> PatternRule {
    PatternRule {
        source: SignalSource::Autocomplete,
        matcher: Matcher::Exact(token),
        weight: 0.95,
    }
}

const fn input_type(value: &'static str, weight: f32) -> PatternRule {
    PatternRule {
        source: SignalSource::InputType,
        matcher: Matcher::Exact(value),
        weight,
    }
}

const fn kw(matcher: Matcher, weight: f32) -> PatternRule {
    PatternRule {
        source: SignalSource::Descriptor,
        matcher,
        weight,
    }
}

use Matcher::{Exact, Phrase, Substring};

pub static FIELD_PATTERNS: &[FieldPattern] = &[
    FieldPattern {
        field_type: FieldType::FirstName,
        rules: &[
            ac("given name"),
            kw(Phrase("first name"), 0.9),
            kw(Phrase("given name"), 0.9),
            kw(Phrase("fname"), 0.85),
            kw(Phrase("forename"), 0.85),
            kw(Exact("first"), 0.6),
        ],
    },
    FieldPattern {
        field_type: FieldType::LastName,
        rules: &[
            ac("family name"),
            kw(Phrase("last name"), 0.9),
            kw(Phrase("family name"), 0.9),
            kw(Phrase("surname"), 0.9),
            kw(Phrase("lname"), 0.85),
            kw(Exact("last"), 0.6),
        ],
    },
    FieldPattern {
        field_type: FieldType::FullName,
        rules: &[
            ac("name"),
            kw(Phrase("full name"), 0.9),
            kw(Exact("your name"), 0.8),
            kw(Phrase("legal name"), 0.75),
            kw(Exact("applicant name"), 0.75),
            kw(Exact("name"), 0.7),
        ],
    },
    FieldPattern {
        field_type: FieldType::Email,
        rules: &[
            ac("email"),
            input_type("email", 0.9),
            kw(Phrase("email"), 0.9),
            kw(Phrase("e mail"), 0.85),
        ],
    },
    FieldPattern {
        field_type: FieldType::Phone,
        rules: &[
            ac("tel"),
            ac("tel national"),
            input_type("tel", 0.85),
            kw(Phrase("phone"), 0.9),
            kw(Phrase("telephone"), 0.9),
            kw(Phrase("mobile"), 0.8),
            kw(Phrase("cell"), 0.7),
            kw(Phrase("tel"), 0.7),
        ],
    },
    FieldPattern {
        field_type: FieldType::Address,
        rules: &[
            ac("street address"),
            ac("address line1"),
            kw(Phrase("address line"), 0.9),
            kw(Phrase("address line1"), 0.9),
            kw(Phrase("street"), 0.85),
            kw(Exact("address"), 0.8),
            kw(Phrase("address"), 0.55),
        ],
    },
    FieldPattern {
        field_type: FieldType::City,
        rules: &[
            ac("address level2"),
            kw(Phrase("city"), 0.85),
            kw(Phrase("town"), 0.7),
        ],
    },
    FieldPattern {
        field_type: FieldType::State,
        rules: &[
            ac("address level1"),
            kw(Phrase("province"), 0.85),
            kw(Phrase("state"), 0.8),
            kw(Phrase("region"), 0.6),
        ],
    },
    FieldPattern {
        field_type: FieldType::ZipCode,
        rules: &[
            ac("postal code"),
            kw(Phrase("zip"), 0.9),
            kw(Phrase("zipcode"), 0.9),
            kw(Phrase("postal code"), 0.9),
            kw(Phrase("postcode"), 0.9),
            kw(Phrase("postal"), 0.8),
        ],
    },
    FieldPattern {
        field_type: FieldType::Country,
        rules: &[
            ac("country"),
            ac("country name"),
            kw(Phrase("country"), 0.85),
        ],
    },
    FieldPattern {
        field_type: FieldType::Linkedin,
        rules: &[kw(Substring("linkedin"), 0.9)],
    },
    FieldPattern {
        field_type: FieldType::Github,
        rules: &[kw(Substring("github"), 0.9)],
    },
    FieldPattern {
        field_type: FieldType::Portfolio,
        rules: &[
            input_type("url", 0.45),
            kw(Phrase("portfolio"), 0.85),
            kw(Phrase("personal website"), 0.85),
            kw(Phrase("personal site"), 0.8),
            kw(Phrase("website"), 0.7),
        ],
    },
    FieldPattern {
        field_type: FieldType::CurrentCompany,
        rules: &[
            ac("organization"),
            kw(Phrase("current company"), 0.9),
            kw(Phrase("company name"), 0.85),
            kw(Phrase("employer"), 0.85),
            kw(Phrase("company"), 0.75),
            kw(Phrase("organization"), 0.6),
        ],
    },
    FieldPattern {
        field_type: FieldType::CurrentPosition,
        rules: &[
            ac("organization title"),
            kw(Phrase("job title"), 0.9),
            kw(Phrase("current title"), 0.9),
            kw(Phrase("current position"), 0.9),
            kw(Phrase("current role"), 0.85),
            kw(Exact("title"), 0.6),
            kw(Phrase("position"), 0.6),
            kw(Phrase("role"), 0.5),
        ],
    },
    FieldPattern {
        field_type: FieldType::YearsOfExperience,
        rules: &[
            kw(Phrase("years of experience"), 0.9),
            kw(Phrase("years experience"), 0.9),
            kw(Phrase("experience years"), 0.85),
            kw(Phrase("total experience"), 0.75),
            kw(Phrase("yoe"), 0.8),
        ],
    },
    FieldPattern {
        field_type: FieldType::Education,
        rules: &[
            kw(Phrase("highest education"), 0.85),
            kw(Phrase("education level"), 0.85),
            kw(Exact("education"), 0.75),
        ],
    },
    FieldPattern {
        field_type: FieldType::Degree,
        rules: &[
            kw(Phrase("degree"), 0.85),
            kw(Phrase("qualification"), 0.6),
        ],
    },
    FieldPattern {
        field_type: FieldType::School,
        rules: &[
            kw(Phrase("school"), 0.85),
            kw(Phrase("university"), 0.85),
            kw(Phrase("college"), 0.8),
            kw(Phrase("institution"), 0.8),
        ],
    },
    FieldPattern {
        field_type: FieldType::Field,
        rules: &[
            kw(Phrase("field of study"), 0.9),
            kw(Phrase("area of study"), 0.85),
            kw(Phrase("major"), 0.8),
            kw(Phrase("discipline"), 0.7),
        ],
    },
    FieldPattern {
        field_type: FieldType::Skills,
        rules: &[
            kw(Phrase("skills"), 0.85),
            kw(Phrase("skill"), 0.8),
            kw(Phrase("technologies"), 0.6),
        ],
    },
];

/// Descriptor signals and how far each is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    Label,
    AriaLabel,
    Name,
    Id,
    Placeholder,
    NearbyText,
}

impl Descriptor {
    pub fn reliability(self) -> f32 {
        match self {
            Descriptor::Label => 1.0,
            Descriptor::AriaLabel => 0.95,
            Descriptor::Name => 0.85,
            Descriptor::Id => 0.8,
            Descriptor::Placeholder => 0.55,
            Descriptor::NearbyText => 0.5,
        }
    }
}

/// Raw evidence gathered for one control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    pub autocomplete: Option<String>,
    pub input_type: Option<String>,
    pub label: Option<String>,
    pub aria_label: Option<String>,
    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    pub nearby_text: Option<String>,
}

impl SignalSet {
    fn descriptors(&self) -> [(Descriptor, Option<&str>); 6] {
        [
            (Descriptor::Label, self.label.as_deref()),
            (Descriptor::AriaLabel, self.aria_label.as_deref()),
            (Descriptor::Name, self.name.as_deref()),
            (Descriptor::Id, self.id.as_deref()),
            (Descriptor::Placeholder, self.placeholder.as_deref()),
            (Descriptor::NearbyText, self.nearby_text.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub field_type: FieldType,
    pub confidence: f32,
}

/// Normalized view of a [`SignalSet`], computed once per control.
struct NormalizedSignals {
    autocomplete: Option<String>,
    input_type: Option<String>,
    descriptors: Vec<(Descriptor, String)>,
}

impl NormalizedSignals {
    fn new(signals: &SignalSet) -> Self {
        Self {
            autocomplete: signals
                .autocomplete
                .as_deref()
                .and_then(autocomplete_token)
                .map(|t| normalize(&t)),
            input_type: signals.input_type.as_deref().map(normalize),
            descriptors: signals
                .descriptors()
                .into_iter()
                .filter_map(|(d, text)| {
                    let n = normalize(text?);
                    (!n.is_empty()).then_some((d, n))
                })
                .collect(),
        }
    }
}

/// Picks the best-supported field type, or `None` when no rule fires.
pub fn classify(signals: &SignalSet) -> Option<Classification> {
    let normalized = NormalizedSignals::new(signals);
    let mut best: Option<Classification> = None;

    for pattern in FIELD_PATTERNS {
        let confidence = score_pattern(pattern, &normalized);
        if confidence <= 0.0 {
            continue;
        }
        if best.map_or(true, |b| confidence > b.confidence) {
            best = Some(Classification {
                field_type: pattern.field_type,
                confidence,
            });
        }
    }
    best
}

/// Evidence for a single field type, in `[0, 1]`.
#[cfg(test)]
pub fn score(pattern: &FieldPattern, signals: &SignalSet) -> f32 {
    score_pattern(pattern, &NormalizedSignals::new(signals))
}

fn score_pattern(pattern: &FieldPattern, signals: &NormalizedSignals) -> f32 {
    let strongest = |source: SignalSource, text: &str, discount: f32| -> f32 {
        pattern
            .rules
            .iter()
            .filter(|r| r.source == source && r.matcher.matches(text))
            .map(|r| r.weight * discount)
            .fold(0.0_f32, f32::max)
    };

    let mut hits = Vec::with_capacity(8);
    if let Some(token) = &signals.autocomplete {
        hits.push(strongest(SignalSource::Autocomplete, token, 1.0));
    }
    if let Some(t) = &signals.input_type {
        hits.push(strongest(SignalSource::InputType, t, 1.0));
    }
    for (descriptor, text) in &signals.descriptors {
        hits.push(strongest(
            SignalSource::Descriptor,
            text,
            descriptor.reliability(),
        ));
    }

    let miss: f32 = hits.iter().map(|w| 1.0 - w.clamp(0.0, 1.0)).product();
    (1.0 - miss).clamp(0.0, 1.0)
}

/// The field-name token of an `autocomplete` attribute, ignoring section and
/// shipping/billing prefixes. `on`/`off` carry no meaning.
fn autocomplete_token(raw: &str) -> Option<String> {
    let token = raw
        .split_whitespace()
        .filter(|t| !t.eq_ignore_ascii_case("webauthn"))
        .last()?
        .to_ascii_lowercase();
    match token.as_str() {
        "on" | "off" => None,
        _ => Some(token),
    }
}

/// Lower-cases, splits camelCase and turns punctuation into single spaces:
/// `applicant[firstName]` → `applicant first name`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
        prev = Some(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
