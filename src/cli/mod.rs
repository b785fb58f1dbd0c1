use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::application::{AppError, TrackerService, TripPlan};
use crate::domain::{Friend, FriendId, SettlementError, format_cents, parse_cents};

/// Grouppy - ride-sharing fairness and shared-expense tracker
#[derive(Parser)]
#[command(name = "grouppy")]
#[command(about = "Track who drives, who rides along, and where the money goes")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "grouppy.db")]
    pub database: String,

    /// Account to operate on (stands in for a login session)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Roster management commands
    #[command(subcommand)]
    Friend(FriendCommands),

    /// Settle a trip: reward the drivers, charge the passengers
    Trip {
        /// Trip distance (unit-less; kilometers in practice)
        #[arg(long)]
        distance: f64,

        /// Friend id of a driver (repeat for several drivers)
        #[arg(long = "driver")]
        drivers: Vec<FriendId>,

        /// Friend id of a passenger (repeat for several passengers)
        #[arg(long = "passenger")]
        passengers: Vec<FriendId>,

        /// Trip title, echoed in the confirmation
        #[arg(long)]
        titolo: Option<String>,

        /// Trip date (YYYY-MM-DD), echoed in the confirmation
        #[arg(long)]
        data: Option<String>,

        /// Departure place, echoed in the confirmation
        #[arg(long)]
        partenza: Option<String>,

        /// Destination, echoed in the confirmation
        #[arg(long)]
        destinazione: Option<String>,
    },

    /// Cash transaction commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Show the dashboard: roster by score, best/worst friends, cassa
    Dashboard,

    /// Verify that the cassa matches the sum of the transactions
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: transazioni, friends, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new account
    Add {
        username: String,

        /// Contact email
        #[arg(long)]
        email: String,

        /// Password to hash and store (never verified by this tool)
        #[arg(long)]
        password: Option<String>,
    },

    /// List all accounts
    List,

    /// Show one account
    Show { username: String },
}

#[derive(Subcommand)]
pub enum FriendCommands {
    /// Add a friend to the roster
    Add {
        nome: String,
        cognome: String,

        /// Contact email
        #[arg(long)]
        email: String,
    },

    /// List the roster, best score first
    List,

    /// Show one friend's profile
    Show { id: FriendId },

    /// Edit a friend's profile (the score only moves through trips)
    Edit {
        id: FriendId,

        #[arg(long)]
        nome: Option<String>,

        #[arg(long)]
        cognome: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Remove a friend from the roster
    Delete { id: FriendId },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a transaction (positive costo fills the cassa, negative drains it)
    Add {
        titolo: String,

        /// Signed amount, e.g. "12.50" or "-7"
        #[arg(long)]
        costo: String,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        data: Option<String>,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        descrizione: String,
    },

    /// List transactions, most recent first
    List,

    /// Edit a transaction; the cassa absorbs the difference
    Edit {
        id: i64,

        #[arg(long)]
        titolo: Option<String>,

        #[arg(long)]
        costo: Option<String>,

        #[arg(long)]
        data: Option<String>,

        #[arg(long)]
        descrizione: Option<String>,
    },

    /// Delete a transaction and refund its costo from the cassa
    Delete { id: i64 },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                TrackerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
                Ok(())
            }

            Commands::User(ref cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                run_user_command(&service, cmd).await
            }

            Commands::Friend(ref cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;
                run_friend_command(&service, owner, cmd).await
            }

            Commands::Trip {
                distance,
                ref drivers,
                ref passengers,
                ref titolo,
                ref data,
                ref partenza,
                ref destinazione,
            } => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;

                let data = data
                    .as_deref()
                    .map(parse_date)
                    .transpose()?
                    .unwrap_or_else(|| Utc::now().date_naive());

                let plan = TripPlan {
                    distance,
                    drivers: drivers.clone(),
                    passengers: passengers.clone(),
                };

                let outcome = match service.record_trip(owner, &plan).await {
                    Ok(outcome) => outcome,
                    Err(AppError::Trip(err)) => {
                        let roster = service.list_friends(owner).await?;
                        bail!("Trip rejected: {}", describe_trip_error(&roster, &err));
                    }
                    Err(err) => return Err(err.into()),
                };

                let label = match (titolo, partenza, destinazione) {
                    (Some(t), _, _) => t.clone(),
                    (None, Some(p), Some(d)) => format!("{} -> {}", p, d),
                    _ => "Trip".to_string(),
                };
                println!(
                    "{} ({}, distance {}) settled:",
                    label, data, outcome.distance
                );
                for p in &outcome.participants {
                    println!(
                        "  {:<24} {:+}  (score {})",
                        p.friend.display_name(),
                        p.delta,
                        p.friend.score
                    );
                }
                Ok(())
            }

            Commands::Tx(ref cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;
                run_tx_command(&service, owner, cmd).await
            }

            Commands::Dashboard => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;
                run_dashboard_command(&service, owner).await
            }

            Commands::Check => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;
                let audit = service.audit(owner).await?;
                if audit.is_consistent() {
                    println!(
                        "Cassa OK: {} matches the transaction log",
                        format_cents(audit.stored)
                    );
                } else {
                    println!(
                        "Cassa MISMATCH: stored {} but transactions sum to {} (drift {})",
                        format_cents(audit.stored),
                        format_cents(audit.computed),
                        format_cents(audit.drift())
                    );
                }
                Ok(())
            }

            Commands::Export {
                ref export_type,
                ref output,
            } => {
                let service = TrackerService::connect(&self.database).await?;
                let owner = self.owner()?;
                run_export_command(&service, owner, export_type, output.as_deref()).await
            }
        }
    }

    /// The account every owner-scoped command operates on. A required flag
    /// here plays the role a login session plays in a web frontend.
    fn owner(&self) -> Result<&str> {
        self.user
            .as_deref()
            .context("--user is required for this command")
    }
}

async fn run_user_command(service: &TrackerService, cmd: &UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add {
            username,
            email,
            password,
        } => {
            let user = service
                .register_user(username.clone(), email.clone(), password.as_deref())
                .await?;
            println!("Registered user: {} <{}>", user.username, user.email);
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<16} {:<28} {:>12}", "USERNAME", "EMAIL", "CASSA");
                println!("{}", "-".repeat(58));
                for user in users {
                    println!(
                        "{:<16} {:<28} {:>12}",
                        user.username,
                        user.email,
                        format_cents(user.cassa)
                    );
                }
            }
        }

        UserCommands::Show { username } => {
            let user = service.get_user(username).await?;
            println!("User: {}", user.username);
            println!("  Email:   {}", user.email);
            println!("  Cassa:   {}", format_cents(user.cassa));
            println!(
                "  Created: {}",
                user.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

async fn run_friend_command(
    service: &TrackerService,
    owner: &str,
    cmd: &FriendCommands,
) -> Result<()> {
    match cmd {
        FriendCommands::Add {
            nome,
            cognome,
            email,
        } => {
            let friend = service
                .add_friend(owner, nome.clone(), cognome.clone(), email.clone())
                .await?;
            println!("Added friend: {} ({})", friend.display_name(), friend.id);
        }

        FriendCommands::List => {
            let friends = service.list_friends(owner).await?;
            if friends.is_empty() {
                println!("No friends in the roster.");
            } else {
                print_roster(&friends);
            }
        }

        FriendCommands::Show { id } => {
            let friend = service.get_friend(owner, *id).await?;
            println!("Friend: {}", friend.display_name());
            println!("  ID:      {}", friend.id);
            println!("  Email:   {}", friend.email);
            println!("  Score:   {}", friend.score);
            println!(
                "  Created: {}",
                friend.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        FriendCommands::Edit {
            id,
            nome,
            cognome,
            email,
        } => {
            let friend = service
                .edit_friend(owner, *id, nome.clone(), cognome.clone(), email.clone())
                .await?;
            println!("Updated friend: {} ({})", friend.display_name(), friend.id);
        }

        FriendCommands::Delete { id } => {
            let friend = service.delete_friend(owner, *id).await?;
            println!("Deleted friend: {}", friend.display_name());
        }
    }
    Ok(())
}

async fn run_tx_command(service: &TrackerService, owner: &str, cmd: &TxCommands) -> Result<()> {
    match cmd {
        TxCommands::Add {
            titolo,
            costo,
            data,
            descrizione,
        } => {
            let costo = parse_cents(costo).context("Invalid costo format. Use '12.50' or '-7'")?;
            let data = data
                .as_deref()
                .map(parse_date)
                .transpose()?
                .unwrap_or_else(|| Utc::now().date_naive());

            let outcome = service
                .add_transazione(owner, titolo.clone(), descrizione.clone(), data, costo)
                .await?;
            println!(
                "Recorded transaction {} ({}): {} -> cassa {}",
                outcome.transazione.titolo,
                outcome.transazione.id,
                format_cents(outcome.transazione.costo),
                format_cents(outcome.cassa)
            );
        }

        TxCommands::List => {
            let transazioni = service.list_transazioni(owner).await?;
            if transazioni.is_empty() {
                println!("No transactions found.");
            } else {
                println!(
                    "{:<6} {:<12} {:<24} {:>12}",
                    "ID", "DATA", "TITOLO", "COSTO"
                );
                println!("{}", "-".repeat(58));
                for t in transazioni {
                    println!(
                        "{:<6} {:<12} {:<24} {:>12}",
                        t.id,
                        t.data.to_string(),
                        t.titolo,
                        format_cents(t.costo)
                    );
                }
            }
        }

        TxCommands::Edit {
            id,
            titolo,
            costo,
            data,
            descrizione,
        } => {
            let costo = costo
                .as_deref()
                .map(parse_cents)
                .transpose()
                .context("Invalid costo format. Use '12.50' or '-7'")?;
            let data = data.as_deref().map(parse_date).transpose()?;

            let outcome = service
                .edit_transazione(
                    owner,
                    *id,
                    titolo.clone(),
                    descrizione.clone(),
                    data,
                    costo,
                )
                .await?;
            println!(
                "Updated transaction {} ({}) -> cassa {}",
                outcome.transazione.titolo,
                outcome.transazione.id,
                format_cents(outcome.cassa)
            );
        }

        TxCommands::Delete { id } => {
            let outcome = service.delete_transazione(owner, *id).await?;
            println!(
                "Deleted transaction {} ({}) -> cassa {}",
                outcome.transazione.titolo,
                outcome.transazione.id,
                format_cents(outcome.cassa)
            );
        }
    }
    Ok(())
}

async fn run_dashboard_command(service: &TrackerService, owner: &str) -> Result<()> {
    let dashboard = service.dashboard(owner).await?;

    println!(
        "{} - cassa {}",
        dashboard.user.username,
        format_cents(dashboard.user.cassa)
    );

    if dashboard.friends.is_empty() {
        println!("\nNo friends in the roster.");
    } else {
        let names = |friends: &[Friend]| {
            friends
                .iter()
                .map(Friend::display_name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("\nBest friends:  {}", names(&dashboard.best_friends));
        println!("Worst friends: {}", names(&dashboard.worst_friends));
        println!();
        print_roster(&dashboard.friends);
    }

    if !dashboard.transazioni.is_empty() {
        println!("\nRecent transactions:");
        for t in dashboard.transazioni.iter().take(10) {
            println!(
                "  {} {:<24} {:>12}",
                t.data,
                t.titolo,
                format_cents(t.costo)
            );
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &TrackerService,
    owner: &str,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(stdout()),
    };

    match export_type {
        "transazioni" => {
            let count = exporter.export_transazioni_csv(owner, writer).await?;
            eprintln!("Exported {} transactions", count);
        }
        "friends" => {
            let count = exporter.export_friends_csv(owner, writer).await?;
            eprintln!("Exported {} friends", count);
        }
        "full" => {
            exporter.export_snapshot_json(owner, writer).await?;
            eprintln!("Exported full snapshot for {}", owner);
        }
        other => bail!(
            "Unknown export type '{}'. Valid types: transazioni, friends, full",
            other
        ),
    }
    Ok(())
}

fn print_roster(friends: &[Friend]) {
    println!("{:<6} {:<24} {:<28} {:>8}", "ID", "NAME", "EMAIL", "SCORE");
    println!("{}", "-".repeat(70));
    for friend in friends {
        println!(
            "{:<6} {:<24} {:<28} {:>8}",
            friend.id,
            friend.display_name(),
            friend.email,
            friend.score
        );
    }
}

/// Resolve ids to display names when phrasing a settlement failure, so the
/// message reads like the roster the user just typed in.
fn describe_trip_error(roster: &[Friend], err: &SettlementError) -> String {
    let name = |id: FriendId| {
        roster
            .iter()
            .find(|f| f.id == id)
            .map(Friend::display_name)
            .unwrap_or_else(|| format!("friend {}", id))
    };
    match err {
        SettlementError::ConflictingRole(id) => format!(
            "{} cannot be both driver and passenger on the same trip",
            name(*id)
        ),
        SettlementError::FriendNotFound(id) => format!("friend {} does not exist", id),
        other => other.to_string(),
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", input))
}
