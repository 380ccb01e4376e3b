//! CLI module for the FoodLoop command-line client.
//!
//! Each invocation is one short-lived tab on the profile storage file:
//! - `status` - Show who is signed in
//! - `login` / `logout` / `signup` - Manage the session
//! - `surplus list|add` - Browse or post surplus listings
//! - `requests list|show|create|respond` - Work through food requests
//! - `config check` - Validate configuration file

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use foodloop::config::Config;
use foodloop::lifecycle::RequestBuckets;
use foodloop::models::{
    Decision, FoodRequest, ListingFilters, ListingScope, NewListing, RequestDirection,
    RequestDraft, RespondRequest, Role, SignupForm, SurplusListing,
};
use foodloop::notice::Notice;
use foodloop::{ClientError, FoodLoop};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "foodloop")]
#[command(author, version, about = "Client for the FoodLoop surplus food network", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "foodloop.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Backend URL (overrides api.base_url)
    #[arg(long, env = "FOODLOOP_API_URL")]
    pub api_url: Option<String>,

    /// Profile storage file (overrides storage.path)
    #[arg(long, env = "FOODLOOP_STORAGE")]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the current authentication state
    Status,

    /// Sign in and store the credential
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "FOODLOOP_PASSWORD", hide_env_values = true)]
        password: String,
        /// Ask the backend for a long-lived session
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and clear the stored credential
    Logout,

    /// Create an account
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "FOODLOOP_PASSWORD", hide_env_values = true)]
        password: String,
        /// Farmer, NGO or Retailer
        #[arg(short, long)]
        role: Role,
    },

    /// Surplus listing commands
    #[command(subcommand)]
    Surplus(SurplusCommands),

    /// Food request commands
    #[command(subcommand)]
    Requests(RequestsCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum SurplusCommands {
    /// List listings (your own unless --all)
    List {
        /// Everyone's listings
        #[arg(long)]
        all: bool,
        /// Search term matched against name and type
        #[arg(long)]
        term: Option<String>,
        #[arg(long = "type")]
        food_type: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Post a new listing
    Add {
        #[arg(long)]
        name: String,
        /// e.g. "50 kg"
        #[arg(long)]
        quantity: String,
        /// Expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: NaiveDate,
        #[arg(long)]
        location: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequestsCommands {
    /// List requests (made for NGOs, received for providers, unless --direction)
    List {
        /// made or received
        #[arg(short, long)]
        direction: Option<RequestDirection>,
    },
    /// Show one request
    Show { id: i64 },
    /// Request food from a listing
    Create {
        listing_id: i64,
        /// Defaults to the listing's full quantity
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Defaults to your username
        #[arg(long)]
        organization: Option<String>,
    },
    /// Accept or decline a request
    Respond {
        id: i64,
        /// accept or decline
        decision: Decision,
        /// Required when accepting (YYYY-MM-DD)
        #[arg(long)]
        pickup_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

impl Cli {
    /// Configuration with command-line overrides applied
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(api_url) = &self.api_url {
            config.api.base_url = api_url.clone();
        }
        if let Some(storage) = &self.storage {
            config.storage.path = storage.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli, config);
    }

    let app = report(FoodLoop::from_config(config))?;
    match &cli.command {
        Commands::Status => cmd_status(&app).await,
        Commands::Login {
            email,
            password,
            remember,
        } => cmd_login(&app, email, password, *remember).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Signup {
            username,
            email,
            password,
            role,
        } => {
            let form = SignupForm {
                username: username.clone(),
                email: email.clone(),
                password: password.clone(),
                confirm_password: password.clone(),
                role: Some(*role),
            };
            cmd_signup(&app, &form).await
        }
        Commands::Surplus(SurplusCommands::List {
            all,
            term,
            food_type,
            location,
        }) => {
            let filters = ListingFilters {
                term: term.clone(),
                food_type: food_type.clone(),
                location: location.clone(),
            };
            let scope = if *all { ListingScope::All } else { ListingScope::Own };
            cmd_surplus_list(&app, scope, &filters).await
        }
        Commands::Surplus(SurplusCommands::Add {
            name,
            quantity,
            expires,
            location,
        }) => {
            let listing = NewListing {
                food_name: name.clone(),
                quantity: quantity.clone(),
                expiration_date: *expires,
                location: location.clone(),
            };
            cmd_surplus_add(&app, &listing).await
        }
        Commands::Requests(RequestsCommands::List { direction }) => {
            cmd_requests_list(&app, *direction).await
        }
        Commands::Requests(RequestsCommands::Show { id }) => cmd_requests_show(&app, *id).await,
        Commands::Requests(RequestsCommands::Create {
            listing_id,
            quantity,
            notes,
            organization,
        }) => {
            let draft = RequestDraft {
                quantity: quantity.clone(),
                notes: notes.clone(),
                organization_name: organization.clone(),
            };
            cmd_requests_create(&app, *listing_id, draft).await
        }
        Commands::Requests(RequestsCommands::Respond {
            id,
            decision,
            pickup_date,
            notes,
        }) => cmd_requests_respond(&app, *id, *decision, *pickup_date, notes.clone()).await,
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

/// Turn a client error into a printable failure
fn report<T>(result: std::result::Result<T, ClientError>) -> Result<T> {
    result.map_err(|err| anyhow::anyhow!("{}", Notice::from_error(&err)))
}

async fn cmd_status(app: &FoodLoop) -> Result<()> {
    let status = app.session.check_auth().await;
    match status.identity {
        Some(identity) if status.authenticated => {
            println!("Signed in");
            println!();
            println!("ID:       {}", identity.id);
            println!("Email:    {}", identity.email);
            println!("Username: {}", identity.username.as_deref().unwrap_or("-"));
            println!("Role:     {}", identity.role);
        }
        _ => println!("Not signed in."),
    }
    Ok(())
}

async fn cmd_login(app: &FoodLoop, email: &str, password: &str, remember: bool) -> Result<()> {
    let outcome = report(app.session.login(email, password, remember).await)?;
    let description = match &outcome.identity {
        Some(identity) => format!("Signed in as {} ({})", identity.email, identity.role),
        None => outcome.message.clone(),
    };
    println!("{}", Notice::success("Login Successful", description));
    Ok(())
}

async fn cmd_logout(app: &FoodLoop) -> Result<()> {
    match app.session.logout().await {
        Ok(()) => println!("{}", Notice::success("Logged Out", "")),
        // Local state is already cleared; the backend failure is only a warning
        Err(err) => println!(
            "{}",
            Notice::warning("Logged Out Locally", err.to_string())
        ),
    }
    Ok(())
}

async fn cmd_signup(app: &FoodLoop, form: &SignupForm) -> Result<()> {
    let message = report(app.session.signup(form).await)?;
    println!("{}", Notice::success("Account Created", message));
    println!("You can now log in with `foodloop login`.");
    Ok(())
}

async fn cmd_surplus_list(app: &FoodLoop, scope: ListingScope, filters: &ListingFilters) -> Result<()> {
    app.session.check_auth().await;
    let snapshot = app.surplus.list(scope, filters).await;
    if let Some(err) = &snapshot.error {
        println!("{}", Notice::from_error(err));
    }
    print_listings(&snapshot.items);
    Ok(())
}

async fn cmd_surplus_add(app: &FoodLoop, listing: &NewListing) -> Result<()> {
    app.session.check_auth().await;
    let created = report(app.surplus.create(listing).await)?;
    println!(
        "{}",
        Notice::success(
            "Listing Created",
            format!("{} ({}) is now listed as #{}", created.name, created.quantity, created.id)
        )
    );
    Ok(())
}

async fn cmd_requests_list(app: &FoodLoop, direction: Option<RequestDirection>) -> Result<()> {
    app.session.check_auth().await;
    let snapshot = match direction {
        Some(direction) => app.requests.list_requests(direction).await,
        None => app.requests.my_requests().await,
    };
    if let Some(err) = &snapshot.error {
        println!("{}", Notice::from_error(err));
    }

    let buckets = RequestBuckets::partition(&snapshot.items);
    if buckets.is_empty() {
        println!("No requests found.");
        return Ok(());
    }
    print_bucket("Pending", &buckets.pending);
    print_bucket("Active", &buckets.active);
    print_bucket("Past", &buckets.past);
    Ok(())
}

async fn cmd_requests_show(app: &FoodLoop, id: i64) -> Result<()> {
    let status = app.session.check_auth().await;
    let request = report(app.requests.get_request(id).await)?;

    println!();
    println!("=== Request #{} ===", request.id);
    println!();
    println!("Food:      {}", request.food_name.as_deref().unwrap_or("-"));
    println!("Listing:   #{}", request.listing_id);
    println!("Quantity:  {}", request.quantity_requested);
    println!("Status:    {}", request.status);
    println!("Requested: {}", request.request_date);
    println!("Requester: {}", request.requester_name.as_deref().unwrap_or("-"));
    println!("Provider:  {}", request.provider_name.as_deref().unwrap_or("-"));
    if let Some(pickup) = request.pickup_date {
        println!("Pickup:    {}", pickup);
    }
    if let Some(notes) = &request.notes {
        println!("Notes:     {}", notes);
    }

    if let Some(identity) = &status.identity {
        let decisions = request.available_decisions(identity);
        if !decisions.is_empty() {
            println!();
            println!(
                "Respond with: foodloop requests respond {} <accept|decline>",
                request.id
            );
        }
    }
    println!();
    Ok(())
}

async fn cmd_requests_create(app: &FoodLoop, listing_id: i64, draft: RequestDraft) -> Result<()> {
    app.session.check_auth().await;
    let listings = report(
        app.surplus
            .list(ListingScope::All, &ListingFilters::default())
            .await
            .into_result(),
    )?;
    let listing = listings
        .into_iter()
        .find(|l| l.id == listing_id)
        .ok_or_else(|| anyhow::anyhow!("Listing #{} not found", listing_id))?;

    let created = report(app.requests.create_request(&listing, draft).await)?;
    println!(
        "{}",
        Notice::success(
            "Request Sent",
            format!(
                "Your request for {} ({}) has been sent to the provider.",
                listing.name, created.quantity_requested
            )
        )
    );
    Ok(())
}

async fn cmd_requests_respond(
    app: &FoodLoop,
    id: i64,
    decision: Decision,
    pickup_date: Option<NaiveDate>,
    notes: Option<String>,
) -> Result<()> {
    // Pickup date rule is checked before any network call
    report(RespondRequest::new(id, decision, notes.clone(), pickup_date))?;

    app.session.check_auth().await;
    let request = report(app.requests.get_request(id).await)?;
    let updated = report(
        app.requests
            .respond_to(&request, decision, notes, pickup_date)
            .await,
    )?;

    let notice = match (decision, updated.pickup_date) {
        (Decision::Accept, Some(pickup)) => Notice::success(
            "Request Accepted",
            format!("Pickup scheduled for {}", pickup),
        ),
        _ => Notice::success("Request Declined", "The requester will be notified."),
    };
    println!("{}", notice);
    Ok(())
}

fn cmd_config_check(cli: &Cli, config: &Config) -> Result<()> {
    println!("Checking configuration file: {}", cli.config.display());
    println!();

    if !cli.config.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            cli.config.display()
        );
        println!("Defaults (and command-line overrides) will be used.");
        println!();
    } else {
        println!("[OK] Configuration file is valid!");
        println!();
    }

    println!("=== Configuration Summary ===");
    println!();
    println!("API:");
    println!("  Base URL:     {}", config.api.base_url);
    println!("  Timeout:      {}s", config.api.timeout_secs);
    println!("  Retries:      {}", config.api.retries);
    println!();
    println!("Storage:");
    println!("  Profile:      {}", config.storage.path.display());
    println!();
    println!("Logging:");
    println!("  Level:        {}", config.logging.level);
    println!();
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_listings(listings: &[SurplusListing]) {
    if listings.is_empty() {
        println!("No listings found.");
        return;
    }

    println!();
    println!(
        "{:<6}  {:<24}  {:<12}  {:<20}  {:<10}",
        "ID", "NAME", "QUANTITY", "LOCATION", "EXPIRES"
    );
    println!("{}", "-".repeat(80));
    for listing in listings {
        let expires = listing
            .expiry_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6}  {:<24}  {:<12}  {:<20}  {:<10}",
            listing.id,
            truncate(&listing.name, 24),
            truncate(&listing.quantity, 12),
            truncate(&listing.location, 20),
            expires
        );
    }
    println!();
}

fn print_bucket(title: &str, requests: &[&FoodRequest]) {
    if requests.is_empty() {
        return;
    }

    println!();
    println!("{} ({})", title, requests.len());
    println!("{}", "-".repeat(80));
    for request in requests {
        let pickup = request
            .pickup_date
            .map(|d| format!("pickup {}", d))
            .unwrap_or_default();
        println!(
            "#{:<5}  {:<24}  {:<12}  {:<10}  {}",
            request.id,
            truncate(request.food_name.as_deref().unwrap_or("-"), 24),
            truncate(&request.quantity_requested, 12),
            request.status,
            pickup
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
