use clap::Subcommand;

use crate::cli::config;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::client::PortalClient;
use crate::database::models::Event;

#[derive(Subcommand)]
pub enum EventCommands {
    #[command(about = "List upcoming and past events")]
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, help = "Only events in this category")]
        category: Option<String>,
        #[arg(long, help = "Substring match on title and description")]
        search: Option<String>,
    },

    #[command(about = "Show one event")]
    Show {
        #[arg(help = "Event id")]
        id: String,
    },

    #[command(about = "RSVP to an event")]
    Rsvp {
        #[arg(help = "Event id")]
        id: String,
    },

    #[command(about = "Cancel an RSVP")]
    Cancel {
        #[arg(help = "Event id")]
        id: String,
    },
}

fn signed_in_client() -> anyhow::Result<PortalClient> {
    Ok(config::anonymous_client()?.with_token(config::stored_token()?))
}

fn print_event(event: &Event) {
    println!("{}  {}", event.id, event.title);
    println!("  when:  {}", event.date.format("%Y-%m-%d %H:%M"));
    println!("  where: {}", event.location);
    match event.max_attendees {
        Some(max) => println!("  going: {}/{}", event.attendees.len(), max),
        None => println!("  going: {}", event.attendees.len()),
    }
}

fn output_event(output_format: &OutputFormat, message: &str, event: &Event) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_success(output_format, message, Some(serde_json::to_value(event)?)),
        OutputFormat::Text => {
            output_success(output_format, message, None)?;
            print_event(event);
            Ok(())
        }
    }
}

pub async fn handle(cmd: EventCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = signed_in_client()?;

    match cmd {
        EventCommands::List { page, limit, category, search } => {
            let mut query = vec![("page", page.to_string())];
            if let Some(limit) = limit {
                query.push(("limit", limit.to_string()));
            }
            if let Some(category) = category {
                query.push(("category", category));
            }
            if let Some(search) = search {
                query.push(("search", search));
            }

            let events = client.list_events(&query).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
                OutputFormat::Text => {
                    if events.items.is_empty() {
                        println!("No events found");
                    }
                    for event in &events.items {
                        print_event(event);
                    }
                    let p = &events.pagination;
                    println!("Page {} of {} ({} events)", p.page, p.total_pages.max(1), p.total);
                }
            }
            Ok(())
        }
        EventCommands::Show { id } => {
            let event = client.get_event(&id).await?;
            output_event(&output_format, &event.title, &event)
        }
        EventCommands::Rsvp { id } => {
            let event = client.rsvp(&id).await?;
            output_event(&output_format, "RSVP confirmed", &event)
        }
        EventCommands::Cancel { id } => {
            let event = client.cancel_rsvp(&id).await?;
            output_event(&output_format, "RSVP cancelled", &event)
        }
    }
}
