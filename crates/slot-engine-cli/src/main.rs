//! `slots` CLI: group, validate, expand and book availability slots stored as
//! JSON files.
//!
//! ## Usage
//!
//! ```sh
//! # Group a day's slots into contiguous runs (stdin → stdout)
//! cat slots.json | slots group
//!
//! # Check candidates against existing slots
//! slots validate -i candidates.json --existing store.json
//!
//! # Repeat slots on every Tuesday for three months
//! slots expand -i week.json --mode weekday --weekday tue --months 3
//!
//! # Split 09:00-17:00 New York time into hourly slots
//! slots range --trainer t1 --date 2025-03-11 --from 09:00 --to 17:00 --zone America/New_York
//!
//! # Show slots as a London viewer sees them
//! slots show -i slots.json --zone Europe/London
//!
//! # Book a slot in a JSON snapshot and write the updated snapshot
//! slots book -i store.json -o store.json --slot <id> --package pkg-1 --client c-1
//! ```

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use slot_engine::expander::{expand, RecurrenceMode, RecurrenceRequest};
use slot_engine::ports::{LocalMeetings, StaticProfiles, TracingNotifier};
use slot_engine::proposal::{generate_range, RangeProposal};
use slot_engine::timezone;
use slot_engine::validator::{partition, Candidate, DurationRule};
use slot_engine::{
    AvailabilitySlot, BookingRequest, EngineConfig, InMemoryStore, MeetingRef, SchedulingFacade,
    SlotId,
};

#[derive(Parser)]
#[command(name = "slots", version, about = "Trainer availability slot tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log filter, e.g. "info" or "slot_engine=debug". Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Group slots into contiguous same-status runs
    Group {
        /// Slot array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Validate candidate slots against existing ones
    Validate {
        /// Candidate slot array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Existing slot array
        #[arg(long)]
        existing: Option<String>,
        /// Apply the window-split rule instead of the exact duration set
        #[arg(long)]
        range: bool,
    },
    /// Expand source slots by a recurrence mode
    Expand {
        /// Source slot array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
        /// Existing slot array the expansion must not overlap
        #[arg(long)]
        existing: Option<String>,
        #[arg(long, value_enum)]
        mode: ModeArg,
        /// Weekday for the weekday modes (mon, tue, ...)
        #[arg(long, value_parser = parse_weekday)]
        weekday: Option<Weekday>,
        /// Horizon in months for `--mode weekday`
        #[arg(long, default_value = "1")]
        months: u32,
    },
    /// Split a local window into bucket-sized slots
    Range {
        #[arg(long)]
        trainer: String,
        #[arg(long)]
        date: NaiveDate,
        /// Local start, HH:MM
        #[arg(long, value_parser = parse_time)]
        from: NaiveTime,
        /// Local end, HH:MM; at or before `--from` means the next day
        #[arg(long, value_parser = parse_time)]
        to: NaiveTime,
        #[arg(long)]
        zone: String,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Render slots in a viewer's time zone
    Show {
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        zone: String,
    },
    /// Book a slot in a JSON snapshot
    Book {
        /// Snapshot slot array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Where the updated snapshot goes (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        slot: SlotId,
        #[arg(long)]
        package: String,
        #[arg(long)]
        client: String,
        /// Attach an existing meeting instead of scheduling one
        #[arg(long)]
        meeting: Option<String>,
    },
    /// Release a booked slot in a JSON snapshot
    Release {
        #[arg(short, long)]
        input: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        slot: SlotId,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    NextWeek,
    NextMonth,
    Weekday,
    CurrentMonth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Rejection {
    id: SlotId,
    error: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Group { input, output } => {
            let slots = read_slots(input.as_deref())?;
            let groups = slot_engine::group(&slots);
            tracing::info!(slots = slots.len(), groups = groups.len(), "grouped");
            write_json(output.as_deref(), &groups)?;
        }
        Commands::Validate {
            input,
            existing,
            range,
        } => {
            let candidates = read_slots(input.as_deref())?;
            let existing = match existing.as_deref() {
                Some(path) => read_slots(Some(path))?,
                None => Vec::new(),
            };
            let rule = if range {
                DurationRule::range(&config)
            } else {
                DurationRule::exact(&config)
            };

            if range {
                slot_engine::validate(Candidate::Batch(&candidates), &existing, rule)
                    .context("Window is invalid")?;
                println!("valid: {} slots", candidates.len());
            } else {
                let result = partition(candidates, &existing, rule);
                let rejected: Vec<Rejection> = result
                    .rejected
                    .iter()
                    .map(|(slot, e)| Rejection {
                        id: slot.id.clone(),
                        error: e.to_string(),
                    })
                    .collect();
                if !rejected.is_empty() {
                    write_json(None, &rejected)?;
                    anyhow::bail!(
                        "{} of {} candidates rejected",
                        rejected.len(),
                        rejected.len() + result.accepted.len()
                    );
                }
                println!("valid: {} slots", result.accepted.len());
            }
        }
        Commands::Expand {
            input,
            output,
            existing,
            mode,
            weekday,
            months,
        } => {
            let source_slots = read_slots(input.as_deref())?;
            let mut known = source_slots.clone();
            if let Some(path) = existing.as_deref() {
                known.extend(read_slots(Some(path))?);
            }
            let request = RecurrenceRequest {
                source_slots,
                mode: recurrence_mode(mode, weekday, months)?,
            };
            let expansion =
                expand(&request, &known, &config).context("Failed to expand recurrence")?;
            for skip in &expansion.skipped {
                tracing::warn!(date = %skip.date, source = %skip.source, "instance skipped");
            }
            write_json(output.as_deref(), &expansion)?;
        }
        Commands::Range {
            trainer,
            date,
            from,
            to,
            zone,
            output,
        } => {
            let proposal = RangeProposal {
                trainer_id: trainer,
                date,
                from,
                to,
                time_zone: zone,
            };
            let resolved = generate_range(&proposal, config.range_bucket_minutes);
            if let Some(warning) = &resolved.warning {
                eprintln!("warning: {}", warning);
            }
            write_json(output.as_deref(), &resolved.value)?;
        }
        Commands::Show { input, zone } => {
            let slots = read_slots(input.as_deref())?;
            let mut shown = Vec::with_capacity(slots.len());
            for slot in &slots {
                let rendered = timezone::display(slot, &zone);
                if let Some(warning) = rendered.warning {
                    eprintln!("warning: {}", warning);
                }
                shown.push(rendered.value);
            }
            write_json(None, &shown)?;
        }
        Commands::Book {
            input,
            output,
            slot,
            package,
            client,
            meeting,
        } => {
            let (store, facade) = snapshot_facade(input.as_deref(), config)?;
            let request = BookingRequest {
                package_id: package,
                client_id: client,
                meeting: match meeting {
                    Some(meeting_id) => MeetingRef::Existing { meeting_id },
                    None => MeetingRef::Schedule,
                },
            };
            facade
                .book_slot(&slot, &request)
                .with_context(|| format!("Failed to book slot {}", slot))?;
            write_json(output.as_deref(), &store.snapshot())?;
        }
        Commands::Release {
            input,
            output,
            slot,
        } => {
            let (store, facade) = snapshot_facade(input.as_deref(), config)?;
            facade
                .release_slot(&slot)
                .with_context(|| format!("Failed to release slot {}", slot))?;
            write_json(output.as_deref(), &store.snapshot())?;
        }
    }

    Ok(())
}

fn recurrence_mode(mode: ModeArg, weekday: Option<Weekday>, months: u32) -> Result<RecurrenceMode> {
    let required = || weekday.context("--weekday is required for this mode");
    Ok(match mode {
        ModeArg::NextWeek => RecurrenceMode::NextWeek,
        ModeArg::NextMonth => RecurrenceMode::NextMonth,
        ModeArg::Weekday => RecurrenceMode::DayOfWeekForMonths {
            weekday: required()?,
            months,
        },
        ModeArg::CurrentMonth => RecurrenceMode::DayOfWeekForCurrentMonth {
            weekday: required()?,
        },
    })
}

fn parse_weekday(s: &str) -> std::result::Result<Weekday, String> {
    s.parse::<Weekday>()
        .map_err(|_| format!("Unknown weekday: '{}'. Use mon, tue, wed, thu, fri, sat or sun", s))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("Invalid time: '{}'. Expected HH:MM", s))
}

/// A facade over an in-memory store seeded from a snapshot file.
fn snapshot_facade(
    input: Option<&str>,
    config: EngineConfig,
) -> Result<(Arc<InMemoryStore>, SchedulingFacade)> {
    let store = Arc::new(InMemoryStore::from_slots(read_slots(input)?));
    let facade = SchedulingFacade::new(
        store.clone(),
        Arc::new(LocalMeetings),
        Arc::new(TracingNotifier),
        Arc::new(StaticProfiles::new()),
        config,
    );
    Ok((store, facade))
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path))?;
            EngineConfig::from_toml_str(&raw).with_context(|| format!("Invalid config: {}", path))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn read_slots(path: Option<&str>) -> Result<Vec<AvailabilitySlot>> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Failed to parse slot JSON")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: Option<&str>, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
