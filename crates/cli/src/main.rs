use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use wayfinder_agents::{
    AssistantAgent, AssistantSettings, ChatRequest, EstimateRequest, TemplateNarrator,
};
use wayfinder_core::{
    BlendWeights, Coordinate, ItineraryRequest, PriceBand, RankQuery, TravelMode,
    DEFAULT_RADIUS_METERS, DEFAULT_RESULT_LIMIT,
};
use wayfinder_ml::MlStack;
use wayfinder_observability::{init_tracing, AppMetrics};
use wayfinder_retrieval::PlaceCatalog;

type CatalogAgent = AssistantAgent<Arc<PlaceCatalog>, Arc<PlaceCatalog>>;

#[derive(Debug, Parser)]
#[command(name = "wayfinder")]
#[command(about = "Hanoi place search, itineraries and price estimates")]
struct Cli {
    #[arg(long, env = "WAYFINDER_CATALOG_PATH", default_value = "data/catalog")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank places around a point or landmark and/or by description.
    Search {
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
        #[arg(long)]
        landmark: Option<String>,
        #[arg(long = "category", value_delimiter = ',')]
        categories: Vec<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = DEFAULT_RADIUS_METERS)]
        radius: f64,
        #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = 1)]
        people: u32,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        threshold: Option<f32>,
        /// Distance weight of the blended score; similarity gets the rest.
        #[arg(long)]
        distance_weight: Option<f64>,
    },
    /// Plan a multi-stop itinerary from a starting point.
    Plan {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
        #[arg(long, default_value_t = 8.0)]
        hours: f64,
        #[arg(long)]
        budget: Option<u64>,
        #[arg(long = "interest", value_delimiter = ',')]
        interests: Vec<String>,
        #[arg(long, default_value_t = 1)]
        people: u32,
        #[arg(long)]
        mode: Option<String>,
        /// Local start time, HH:MM.
        #[arg(long)]
        start: Option<String>,
    },
    /// Estimate the cost of a category for a group.
    Estimate {
        #[arg(long)]
        category: String,
        #[arg(long, default_value_t = 1)]
        people: u32,
        #[arg(long, requires = "max")]
        min: Option<u64>,
        #[arg(long, requires = "min")]
        max: Option<u64>,
    },
    /// Compare prices of named places.
    Compare {
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,
    },
    /// Interactive chat.
    Chat {
        #[arg(long)]
        locale: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfinder_cli");
    let cli = Cli::parse();

    let settings = AssistantSettings {
        catalog_path: cli.catalog.clone(),
        ..AssistantSettings::from_env()
    };
    let agent = build_agent(settings)?;

    match cli.command {
        Command::Search {
            lat,
            lon,
            landmark,
            categories,
            text,
            radius,
            limit,
            people,
            mode,
            threshold,
            distance_weight,
        } => {
            let query = RankQuery {
                origin: lat.zip(lon).map(|(lat, lon)| Coordinate::new(lat, lon)),
                landmark,
                categories,
                radius_meters: radius,
                text,
                limit,
                num_people: people,
                mode: mode.as_deref().map(TravelMode::parse),
                score_threshold: threshold,
                blend: distance_weight.map(|distance| BlendWeights {
                    distance,
                    similarity: 1.0 - distance,
                }),
                reference_time: None,
            };
            let result = agent.resolve_and_rank(query).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Plan {
            lat,
            lon,
            hours,
            budget,
            interests,
            people,
            mode,
            start,
        } => {
            if !hours.is_finite() || hours < 0.0 {
                bail!("--hours must be a non-negative number");
            }
            let start_time = start
                .as_deref()
                .map(|value| NaiveTime::parse_from_str(value, "%H:%M"))
                .transpose()
                .context("invalid --start, expected HH:MM")?;

            let request = ItineraryRequest {
                budget_per_person: budget,
                interests,
                num_people: people,
                mode: mode.as_deref().map(TravelMode::parse),
                start_time,
                ..ItineraryRequest::new(Coordinate::new(lat, lon), (hours * 60.0).round() as u32)
            };
            let plan = agent.plan_itinerary(request).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Estimate {
            category,
            people,
            min,
            max,
        } => {
            let custom = min.zip(max).map(|(min, max)| PriceBand::new(min, max));
            let estimate = agent.estimate_cost(EstimateRequest {
                category: Some(category),
                custom,
                places: Vec::new(),
                num_people: people,
                include_transport: false,
            })?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Command::Compare { names } => {
            let outcome = agent.compare_places(&names, None).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Chat { locale } => run_chat(&agent, locale).await?,
    }

    Ok(())
}

async fn run_chat(agent: &CatalogAgent, locale: Option<String>) -> Result<()> {
    println!("Wayfinder chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let request = ChatRequest {
            locale: locale.clone(),
            ..ChatRequest::new(message)
        };
        match agent.handle_chat(request).await {
            Ok(reply) => println!("\n{}\n", reply.reply_text),
            Err(error) => eprintln!("\nerror: {error:#}\n"),
        }
    }

    Ok(())
}

fn build_agent(settings: AssistantSettings) -> Result<CatalogAgent> {
    let metrics = AppMetrics::shared();
    let ml_stack = MlStack::new(settings.embedding_dims);

    let catalog = Arc::new(
        PlaceCatalog::from_path(&settings.catalog_path, Some(ml_stack.embedder.clone()))
            .with_context(|| {
                format!("failed loading catalog from {}", settings.catalog_path.display())
            })?,
    );
    let pricing = Arc::new(settings.load_pricing()?);

    Ok(AssistantAgent::new(
        catalog.clone(),
        catalog,
        TemplateNarrator,
        ml_stack.classifier,
        pricing,
        metrics,
        settings,
    ))
}
