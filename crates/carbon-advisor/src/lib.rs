use carbon_ledger_core::{by_scope, format_amount, format_factor, total_emissions, EmissionRecord};
use serde::{Deserialize, Serialize};

mod groq;

pub use groq::{
    classify_status, extract_completion_text, GroqClient, GroqConfig, API_KEY_VAR, DEFAULT_ENDPOINT,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, ENDPOINT_VAR, MODEL_VAR, TEMPERATURE_VAR,
};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DelegateError {
    #[error("advisory requests need GROQ_API_KEY to be set")]
    MissingApiKey,
    #[error("advisor configuration error: {0}")]
    Config(String),
    #[error("authentication failed, check GROQ_API_KEY: {0}")]
    Auth(String),
    #[error("rate limited by the text generator, try again later: {0}")]
    RateLimited(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected text generator response: {0}")]
    Response(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    Classification,
    ReportSummary,
    OffsetAdvice,
    RegulationCheck,
    Optimization,
}

/// Role, goal and background the text generator is asked to adopt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

impl AdvisoryKind {
    pub const ALL: [Self; 5] = [
        Self::Classification,
        Self::ReportSummary,
        Self::OffsetAdvice,
        Self::RegulationCheck,
        Self::Optimization,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::ReportSummary => "report_summary",
            Self::OffsetAdvice => "offset_advice",
            Self::RegulationCheck => "regulation_check",
            Self::Optimization => "optimization",
        }
    }

    #[must_use]
    pub fn persona(self) -> Persona {
        match self {
            Self::Classification => Persona {
                role: "Carbon data entry assistant for Bangladesh businesses",
                goal: "Classify an activity into the right scope and category and point to a \
                    suitable local emission factor",
                backstory: "You know greenhouse gas accounting and the Bangladesh industrial base: \
                    garments, textiles, jute, leather and pharmaceuticals. You know that load \
                    shedding pushes many sites onto diesel generators and that the national grid \
                    factor is 0.6815 kgCO2e/kWh.",
            },
            Self::ReportSummary => Persona {
                role: "Carbon report analyst for Bangladesh exporters",
                goal: "Turn a ledger of emission records into a readable summary with export \
                    readiness notes",
                backstory: "You write for SME owners selling into the EU, US and Japan. You spot \
                    patterns driven by generator use, monsoon seasons and grid reliability, and \
                    you keep the summary concrete.",
            },
            Self::OffsetAdvice => Persona {
                role: "Carbon offset advisor for Bangladesh",
                goal: "Recommend credible offset and reduction options matched to a company's \
                    footprint",
                backstory: "You follow local mangrove, solar home system and biogas programmes as \
                    well as internationally verified credit markets, and you know the green \
                    financing channels available to Bangladeshi firms.",
            },
            Self::RegulationCheck => Persona {
                role: "Export carbon regulation specialist for Bangladesh",
                goal: "Explain which carbon rules apply to an exporter and what they must prepare",
                backstory: "You track EU CBAM, buyer-driven US sustainability programmes and other \
                    destination market rules, alongside Bangladesh's NDC and the industry bodies \
                    that help exporters comply.",
            },
            Self::Optimization => Persona {
                role: "Industrial emission reduction engineer for Bangladesh",
                goal: "Produce a prioritized, practical reduction plan from recorded emissions",
                backstory: "You work within power outages, tight capital and local supply chains. \
                    You favour rooftop solar, efficient motors and boilers, heat recovery in mills \
                    and generator replacement, and you know which lenders finance them.",
            },
        }
    }

    fn expected_output(self) -> &'static str {
        match self {
            Self::Classification => {
                "The scope, the category, a recommended emission factor with its unit, and any \
                 data quality caveats."
            }
            Self::ReportSummary => {
                "A short report: headline figures, main sources, notable trends, export readiness \
                 and next steps."
            }
            Self::OffsetAdvice => {
                "A list of local and international offset options with indicative costs in BDT \
                 and USD and how to finance them."
            }
            Self::RegulationCheck => {
                "Applicable regulations per market, a compliance timeline, required documentation \
                 and sources of support."
            }
            Self::Optimization => {
                "A prioritized action list with estimated savings, costs in BDT, financing options \
                 and timing."
            }
        }
    }
}

/// One advisory request with the context its profile needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvisoryTask {
    Classification {
        description: String,
    },
    ReportSummary {
        emissions_data: String,
    },
    OffsetAdvice {
        total_kgco2e: f64,
        location: String,
        industry: String,
    },
    RegulationCheck {
        location: String,
        industry: String,
        export_markets: Vec<String>,
    },
    Optimization {
        emissions_data: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl AdvisoryTask {
    #[must_use]
    pub fn kind(&self) -> AdvisoryKind {
        match self {
            Self::Classification { .. } => AdvisoryKind::Classification,
            Self::ReportSummary { .. } => AdvisoryKind::ReportSummary,
            Self::OffsetAdvice { .. } => AdvisoryKind::OffsetAdvice,
            Self::RegulationCheck { .. } => AdvisoryKind::RegulationCheck,
            Self::Optimization { .. } => AdvisoryKind::Optimization,
        }
    }

    #[must_use]
    pub fn prompt(&self) -> Prompt {
        let kind = self.kind();
        let persona = kind.persona();
        let system = format!(
            "You are a {role}.\nGoal: {goal}\n\n{backstory}",
            role = persona.role,
            goal = persona.goal,
            backstory = persona.backstory
        );

        let request = match self {
            Self::Classification { description } => format!(
                "Classify this emission activity reported by a Bangladesh business:\n\
                 {description}\n\n\
                 Decide the scope, pick the closest category, suggest an emission factor \
                 and mention sector-specific considerations."
            ),
            Self::ReportSummary { emissions_data } => format!(
                "Summarize the following emission records for a Bangladesh business:\n\
                 {emissions_data}\n\n\
                 Cover the main sources, comparison with local industry benchmarks, generator use, \
                 seasonal effects and readiness for EU CBAM and US buyer requirements."
            ),
            Self::OffsetAdvice { total_kgco2e, location, industry } => format!(
                "Recommend offset and reduction options for a business with:\n\
                 - Total emissions: {total} kgCO2e\n\
                 - Location: {location}, Bangladesh\n\
                 - Industry: {industry}\n\n\
                 Include local projects, verified international credits, government programmes \
                 and financing.",
                total = format_amount(*total_kgco2e)
            ),
            Self::RegulationCheck { location, industry, export_markets } => format!(
                "Review carbon-related regulatory requirements for an exporter with:\n\
                 - Location: {location}\n\
                 - Industry: {industry}\n\
                 - Export markets: {markets}\n\n\
                 Cover each destination market, national commitments, documentation and the \
                 consequences of non-compliance.",
                markets = export_markets.join(", ")
            ),
            Self::Optimization { emissions_data } => format!(
                "Propose emission reductions for a Bangladesh business based on these records:\n\
                 {emissions_data}\n\n\
                 Target the largest sources first and account for power outages, monsoon timing \
                 and available financing."
            ),
        };

        Prompt { system, user: format!("{request}\n\nExpected output: {}", kind.expected_output()) }
    }
}

/// Boundary to whatever produces advisory prose.
pub trait TextGenerator {
    /// Produce a completion for `prompt`.
    ///
    /// # Errors
    /// Returns a [`DelegateError`] describing why no text was produced.
    fn generate(&self, prompt: &Prompt) -> Result<String, DelegateError>;
}

#[derive(Debug, Clone)]
pub struct Advisor<G> {
    generator: G,
}

impl<G: TextGenerator> Advisor<G> {
    #[must_use]
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Render `task` and return the generator's text unchanged.
    ///
    /// # Errors
    /// Propagates the generator's [`DelegateError`].
    pub fn run(&self, task: &AdvisoryTask) -> Result<String, DelegateError> {
        let prompt = task.prompt();
        tracing::debug!(
            kind = task.kind().as_str(),
            prompt_chars = prompt.system.len() + prompt.user.len(),
            "dispatching advisory prompt"
        );

        match self.generator.generate(&prompt) {
            Ok(text) => Ok(text),
            Err(err) => {
                tracing::warn!(
                    kind = task.kind().as_str(),
                    error = %err,
                    "advisory request failed"
                );
                Err(err)
            }
        }
    }
}

/// Plain-text table of the ledger plus scope totals, used as the data context for
/// the report and optimization profiles.
#[must_use]
pub fn ledger_context(records: &[EmissionRecord]) -> String {
    let mut out = String::from(
        "date | scope | category | activity | quantity | unit | emission_factor | \
         emissions_kgCO2e\n",
    );
    for record in records {
        out.push_str(&format!(
            "{} | {} | {} | {} | {} | {} | {} | {}\n",
            record.date,
            record.scope,
            record.category,
            record.activity,
            record.quantity,
            record.unit,
            format_factor(record.emission_factor),
            format_amount(record.emissions_kg()),
        ));
    }

    out.push_str(&format!(
        "\nTotal: {} kgCO2e across {} records\n",
        format_amount(total_emissions(records)),
        records.len()
    ));
    for total in by_scope(records) {
        out.push_str(&format!(
            "{}: {} kgCO2e\n",
            total.scope,
            format_amount(total.emissions_kgco2e)
        ));
    }
    out
}
