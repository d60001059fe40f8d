//! Player choices offered by a scenario.
//!
//! The kind of a choice (multiple-choice dilemma or job offer) is fixed when
//! the scenario is decoded and carried as the enum variant, so the decision
//! endpoint never has to be guessed from payload shape later on.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// What an MCQ choice does to the player's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactAction {
    Deposit,
    Withdrawal,
    CreateLoan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqImpact {
    pub action: ImpactAction,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobImpact {
    #[serde(with = "rust_decimal::serde::float")]
    pub income: Decimal,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Mcq,
    Job,
}

impl ChoiceKind {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ChoiceKind::Mcq => "/decision/mcq",
            ChoiceKind::Job => "/decision/job",
        }
    }
}

/// One selectable option of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Mcq {
        description: String,
        impact: McqImpact,
    },
    Job {
        description: String,
        impact: JobImpact,
    },
}

impl Choice {
    pub fn kind(&self) -> ChoiceKind {
        match self {
            Choice::Mcq { .. } => ChoiceKind::Mcq,
            Choice::Job { .. } => ChoiceKind::Job,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.kind().endpoint()
    }

    pub fn description(&self) -> &str {
        match self {
            Choice::Mcq { description, .. } | Choice::Job { description, .. } => description,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireImpact {
    Mcq(McqImpact),
    Job(JobImpact),
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    description: String,
    financial_impact: WireImpact,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireImpactRef<'a> {
    Mcq(&'a McqImpact),
    Job(&'a JobImpact),
}

#[derive(Serialize)]
struct WireChoiceRef<'a> {
    description: &'a str,
    financial_impact: WireImpactRef<'a>,
}

impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireChoice::deserialize(deserializer)?;
        Ok(match wire.financial_impact {
            WireImpact::Mcq(impact) => Choice::Mcq {
                description: wire.description,
                impact,
            },
            WireImpact::Job(impact) => Choice::Job {
                description: wire.description,
                impact,
            },
        })
    }
}

impl Serialize for Choice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let financial_impact = match self {
            Choice::Mcq { impact, .. } => WireImpactRef::Mcq(impact),
            Choice::Job { impact, .. } => WireImpactRef::Job(impact),
        };
        WireChoiceRef {
            description: self.description(),
            financial_impact,
        }
        .serialize(serializer)
    }
}
