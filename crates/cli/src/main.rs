use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chill_agents::{
    AddActivityRequest, AgentSettings, ChatRequest, PlannerAgent, RouteRequest, SearchRequest,
};
use chill_api::config::{DEFAULT_OLLAMA_MODEL, DEFAULT_OSRM_URL, DEFAULT_OVERPASS_URL};
use chill_core::{Category, Coordinates, FilterSelection, DEFAULT_ORIGIN};
use chill_nlu::NluStack;
use chill_observability::{init_tracing, AppMetrics};
use chill_providers::{build_http_client, OsrmRouter, OverpassSource};
use chill_storage::MemoryItineraryStore;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

type Agent = PlannerAgent<OverpassSource, OsrmRouter, NluStack>;

#[derive(Debug, Parser)]
#[command(name = "chill")]
#[command(about = "Eat & Chill planner CLI")]
struct Cli {
    #[command(flatten)]
    upstreams: Upstreams,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Upstreams {
    #[arg(long, env = "CHILL_OVERPASS_URL", default_value = DEFAULT_OVERPASS_URL)]
    overpass_url: String,

    #[arg(long, env = "CHILL_OSRM_URL", default_value = DEFAULT_OSRM_URL)]
    osrm_url: String,

    #[arg(long, env = "CHILL_OLLAMA_URL")]
    ollama_url: Option<String>,

    #[arg(long, env = "CHILL_OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    ollama_model: String,

    #[arg(long, env = "CHILL_UPSTREAM_TIMEOUT_SECONDS", default_value_t = 10)]
    timeout_seconds: u64,

    #[arg(long, env = "CHILL_SEARCH_RADIUS_KM", default_value_t = 5.0)]
    radius_km: f64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Filtered place search around a coordinate.
    Search {
        #[arg(long, default_value_t = DEFAULT_ORIGIN.lat)]
        lat: f64,
        #[arg(long, default_value_t = DEFAULT_ORIGIN.lon)]
        lon: f64,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long, default_value = "food")]
        category: String,
        /// Repeatable food type label, e.g. `--food-type cafe`.
        #[arg(long = "food-type")]
        food_type: Vec<String>,
        #[arg(long)]
        cuisine: Vec<String>,
        #[arg(long)]
        atmosphere: Vec<String>,
        #[arg(long = "activity-type")]
        activity_type: Vec<String>,
        #[arg(long)]
        space: Option<String>,
        #[arg(long)]
        price: Option<String>,
    },
    /// Route between two points, with optional `lat,lon` waypoints.
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long = "via")]
        waypoints: Vec<String>,
    },
    /// Interactive session: free-text chat plus /add, /list, /reset and /route.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("chill_cli");
    let cli = Cli::parse();
    let agent = build_agent(&cli.upstreams)?;

    match cli.command {
        Command::Search {
            lat,
            lon,
            keyword,
            category,
            food_type,
            cuisine,
            atmosphere,
            activity_type,
            space,
            price,
        } => {
            let category = Category::parse(&category)
                .ok_or_else(|| anyhow!("unknown category '{category}'"))?;
            let selection = FilterSelection {
                category: Some(category.as_code().to_string()),
                food_type,
                cuisine,
                atmosphere,
                price,
                activity_type,
                space,
            };
            let filtered = selection != FilterSelection {
                category: selection.category.clone(),
                ..FilterSelection::default()
            };

            let response = agent
                .search(SearchRequest {
                    origin: Some(Coordinates::new(lat, lon)),
                    query: keyword,
                    category: Some(category),
                    filters: filtered.then_some(selection),
                    ..SearchRequest::default()
                })
                .await;
            print_json(&response)?;
        }
        Command::Route {
            from,
            to,
            waypoints,
        } => {
            let route = agent
                .route(RouteRequest {
                    start: parse_point(&from).context("invalid --from")?,
                    end: parse_point(&to).context("invalid --to")?,
                    waypoints: waypoints
                        .iter()
                        .map(|point| parse_point(point))
                        .collect::<Result<Vec<_>>>()
                        .context("invalid --via")?,
                })
                .await?;
            print_json(&route)?;
        }
        Command::Chat => run_session(agent).await?,
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum SessionCommand {
    Add(AddActivityRequest),
    List,
    Reset,
    Route,
    Say(String),
}

/// `/add name | HH:MM | HH:MM | lat | lon [| place]`; anything without a slash is chat.
fn parse_session_line(line: &str) -> Result<SessionCommand> {
    let Some(command) = line.strip_prefix('/') else {
        return Ok(SessionCommand::Say(line.to_string()));
    };

    let (verb, rest) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));
    match verb {
        "list" => Ok(SessionCommand::List),
        "reset" => Ok(SessionCommand::Reset),
        "route" => Ok(SessionCommand::Route),
        "add" => {
            let fields = rest.split('|').map(str::trim).collect::<Vec<_>>();
            let [name, start, end, lat, lon, place @ ..] = fields.as_slice() else {
                bail!("usage: /add name | HH:MM | HH:MM | lat | lon [| place]");
            };
            Ok(SessionCommand::Add(AddActivityRequest {
                name: name.to_string(),
                start_time: start.to_string(),
                end_time: end.to_string(),
                place_name: place.first().copied().unwrap_or(*name).to_string(),
                lat: lat.parse().context("lat must be a number")?,
                lon: lon.parse().context("lon must be a number")?,
            }))
        }
        other => bail!("unknown command /{other}"),
    }
}

async fn run_session(agent: Agent) -> Result<()> {
    println!("Eat & Chill chat. /add, /list, /reset, /route manage the day; 'exit' quits.");

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

        let command = match parse_session_line(message) {
            Ok(command) => command,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };

        match command {
            SessionCommand::Say(text) => {
                let reply = agent.handle_chat(ChatRequest { text, origin: None }).await;
                println!("\n{}\n", reply.reply_text);
            }
            SessionCommand::Add(request) => match agent.add_activity(request).await {
                Ok(ack) => println!("{}", ack.message),
                Err(err) => println!("{err}"),
            },
            SessionCommand::List => print_json(&agent.itinerary().await)?,
            SessionCommand::Reset => {
                agent.reset_itinerary().await;
                println!("itinerary cleared");
            }
            SessionCommand::Route => print_json(&agent.itinerary_route_plan(None).await)?,
        }
    }

    Ok(())
}

fn parse_point(raw: &str) -> Result<Coordinates> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected 'lat,lon', got '{raw}'"))?;
    let point = Coordinates::new(lat.trim().parse()?, lon.trim().parse()?);
    if !point.is_valid() {
        bail!("coordinates out of range: '{raw}'");
    }
    Ok(point)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_agent(upstreams: &Upstreams) -> Result<Agent> {
    let client = build_http_client(Duration::from_secs(upstreams.timeout_seconds))
        .context("failed to build upstream HTTP client")?;
    let classifier = match upstreams.ollama_url.as_deref() {
        Some(base_url) => {
            NluStack::remote(client.clone(), base_url, upstreams.ollama_model.clone())
        }
        None => NluStack::keyword(),
    };

    Ok(PlannerAgent::new(
        Arc::new(OverpassSource::new(client.clone(), upstreams.overpass_url.clone())),
        Arc::new(OsrmRouter::new(client, upstreams.osrm_url.clone())),
        Arc::new(classifier),
        MemoryItineraryStore::new(),
        AppMetrics::shared(),
        AgentSettings {
            search_radius_km: upstreams.radius_km,
            ..AgentSettings::default()
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_optional_place() {
        let command = parse_session_line("/add Lunch | 12:00 | 13:00 | 10.77 | 106.69 | Pho Place")
            .unwrap();
        let SessionCommand::Add(request) = command else {
            panic!("expected add, got {command:?}");
        };
        assert_eq!(request.name, "Lunch");
        assert_eq!(request.place_name, "Pho Place");
        assert_eq!(request.lat, 10.77);

        let SessionCommand::Add(request) =
            parse_session_line("/add Coffee | 13:30 | 14:00 | 10.78 | 106.70").unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(request.place_name, "Coffee");
    }

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            parse_session_line("tìm quán lẩu").unwrap(),
            SessionCommand::Say("tìm quán lẩu".to_string())
        );
        assert_eq!(parse_session_line("/route").unwrap(), SessionCommand::Route);
    }

    #[test]
    fn rejects_short_add_and_unknown_commands() {
        assert!(parse_session_line("/add Lunch | 12:00").is_err());
        assert!(parse_session_line("/dance").is_err());
    }

    #[test]
    fn points_need_lat_lon_in_range() {
        assert_eq!(
            parse_point("10.77, 106.69").unwrap(),
            Coordinates::new(10.77, 106.69)
        );
        assert!(parse_point("10.77").is_err());
        assert!(parse_point("100,0").is_err());
    }
}
