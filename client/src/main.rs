use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use autotrips_client::{
    backend::{BackendError, clients::http::HttpBackend},
    config::ClientConfig,
    forms::{
        SubmitError, SubmitOutcome, VehicleBatch,
        edit::{EditError, EditOutcome, VehicleEdit},
        import::{ImportError, SpreadsheetImport},
    },
    models::{Attachment, SessionPhase, Vehicle, VehicleStatus},
    routing::landing_route,
    session::{SessionError, SessionStore},
    storage::clients::sqlite::SqliteStorage,
    users::UserStore,
    vehicles::VehicleStore,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, warn};

#[derive(Parser, Debug)]
#[command(name = "autotrips", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long, env = "AUTOTRIPS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored tokens
    Logout,
    /// Show the current session
    Whoami,
    /// Exchange the stored refresh token for a new access token
    Refresh,
    /// List vehicle types
    Types,
    /// List vehicles
    Vehicles {
        #[arg(long)]
        client: Option<i64>,
    },
    /// Show one vehicle
    Vehicle { id: i64 },
    /// Add vehicles for a client in one batch
    Add {
        #[arg(long)]
        client: i64,
        /// `YEAR BRAND MODEL=VIN`; repeat for every vehicle
        #[arg(long = "vehicle", value_parser = parse_vehicle, required = true)]
        vehicles: Vec<(String, String)>,
        /// `N:PATH` attaches a photo to the N-th vehicle (1-based)
        #[arg(long = "photo", value_parser = parse_photo)]
        photos: Vec<(usize, PathBuf)>,
        #[arg(long)]
        container: Option<String>,
        #[arg(long)]
        transporter: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Change fields of a stored vehicle
    Edit {
        id: i64,
        #[arg(long)]
        status: Option<StatusArg>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
        #[arg(long = "remove-photo")]
        remove_photos: Vec<i64>,
        #[arg(long)]
        yes: bool,
    },
    /// Import a client's vehicles from a spreadsheet
    Import {
        #[arg(long)]
        client: i64,
        file: PathBuf,
    },
    /// List accounts
    Users {
        /// Only accounts waiting for approval
        #[arg(long)]
        pending: bool,
    },
    /// Approve an account
    Approve { id: i64 },
}

#[derive(ValueEnum, Debug, Copy, Clone)]
enum StatusArg {
    Accepted,
    Damaged,
}

impl From<StatusArg> for VehicleStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Accepted => VehicleStatus::Accepted,
            StatusArg::Damaged => VehicleStatus::Damaged,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("failed to read {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vehicle {0} is not part of the batch")]
    NoSuchRecord(usize),

    #[error("not signed in")]
    NotSignedIn,
}

struct App {
    session: SessionStore,
    vehicles: VehicleStore,
    users: UserStore,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let tokens = match SqliteStorage::open(&config.db_path).await {
        Ok(storage) => Arc::new(storage),
        Err(err) => {
            error!("failed to open token storage: {err}");
            return ExitCode::FAILURE;
        }
    };
    let backend = Arc::new(HttpBackend::new(config.api_url, tokens.clone()));
    let app = App {
        session: SessionStore::new(backend.clone(), tokens),
        vehicles: VehicleStore::new(backend.clone()),
        users: UserStore::new(backend),
    };

    if let Err(err) = run(app, cli.command).await {
        error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(mut app: App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { phone, password } => {
            app.session.login(&phone, &password).await?;
            print_session(&app.session);
        }
        Command::Logout => app.session.logout().await?,
        Command::Whoami => {
            if let Err(err) = app.session.restore().await {
                warn!("could not restore the session: {err}");
            }
            print_session(&app.session);
        }
        Command::Refresh => {
            if app.session.restore().await?.is_none() {
                return Err(CliError::NotSignedIn);
            }
            print_session(&app.session);
        }
        Command::Types => {
            signed_in(&app.session).await?;
            for t in app.vehicles.fetch_vehicle_types().await? {
                println!("{}\t{}", t.id, t.label);
            }
        }
        Command::Vehicles { client } => {
            signed_in(&app.session).await?;
            for vehicle in app.vehicles.fetch_vehicles(client).await? {
                print_vehicle_row(vehicle);
            }
        }
        Command::Vehicle { id } => {
            signed_in(&app.session).await?;
            let vehicle = app.vehicles.fetch_vehicle(id).await?;
            print_vehicle(vehicle);
        }
        Command::Add {
            client,
            vehicles,
            photos,
            container,
            transporter,
            yes,
        } => {
            signed_in(&app.session).await?;
            let mut batch = VehicleBatch::new(client);
            for (i, (descriptor, vin)) in vehicles.into_iter().enumerate() {
                if i > 0 {
                    batch.add_record().map_err(SubmitError::from)?;
                }
                let record = batch.record_mut(i).ok_or(CliError::NoSuchRecord(i + 1))?;
                record.year_brand_model = descriptor;
                record.vin = vin;
                if i == 0 {
                    record.container_number = container.clone().unwrap_or_default();
                    record.transporter = transporter.clone().unwrap_or_default();
                }
            }
            for (n, path) in photos {
                let attachment = load(&path).await?;
                let record = n
                    .checked_sub(1)
                    .and_then(|i| batch.record_mut(i))
                    .ok_or(CliError::NoSuchRecord(n))?;
                record.document_photos.push(attachment);
            }

            let confirm = |title: &str, message: &str| yes || prompt(title, message);
            match batch.submit(app.vehicles.backend(), &confirm).await {
                Ok(SubmitOutcome::Submitted(created)) => created.iter().for_each(print_vehicle_row),
                Ok(SubmitOutcome::Cancelled) => println!("Cancelled"),
                Err(err) => {
                    print_batch_errors(&batch);
                    return Err(err.into());
                }
            }
        }
        Command::Edit {
            id,
            status,
            comment,
            price,
            photos,
            remove_photos,
            yes,
        } => {
            signed_in(&app.session).await?;
            let mut edit = VehicleEdit::new(app.vehicles.fetch_vehicle(id).await?.clone());
            if let Some(status) = status {
                edit.draft.status = Some(status.into());
            }
            if let Some(comment) = comment {
                edit.draft.comment = comment;
            }
            if let Some(price) = price {
                edit.draft.price = price;
            }
            for path in photos {
                edit.attach(load(&path).await?);
            }
            for photo in remove_photos {
                if !edit.remove_photo(photo) {
                    warn!(photo, "vehicle has no such photo");
                }
            }

            let confirm = |title: &str, message: &str| yes || prompt(title, message);
            match edit.save(&mut app.vehicles, &confirm).await {
                Ok(EditOutcome::Saved(vehicle)) => print_vehicle(&vehicle),
                Ok(EditOutcome::Unchanged) => println!("Nothing to save"),
                Ok(EditOutcome::Cancelled) => println!("Cancelled"),
                Err(err) => {
                    for (field, error) in edit.errors().iter() {
                        eprintln!("{}: {}", field.wire_name(), error.message);
                    }
                    return Err(err.into());
                }
            }
        }
        Command::Import { client, file } => {
            signed_in(&app.session).await?;
            let import = SpreadsheetImport::new(client, load(&file).await?)?;
            let vehicles = import.upload(&mut app.vehicles).await?;
            println!(
                "Imported {}; client now has {} vehicles",
                import.file_name(),
                vehicles.len()
            );
        }
        Command::Users { pending } => {
            signed_in(&app.session).await?;
            app.users.fetch_users().await?;
            for user in app.users.users().iter().filter(|u| !pending || !u.is_approved) {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    user.id,
                    user.role.to_str(),
                    user.full_name,
                    user.phone,
                    if user.is_approved { "approved" } else { "pending" }
                );
            }
        }
        Command::Approve { id } => {
            signed_in(&app.session).await?;
            app.users.approve(id).await?;
        }
    }
    Ok(())
}

/// Restores the stored session so requests carry a fresh access token.
async fn signed_in(session: &SessionStore) -> Result<(), CliError> {
    match session.restore().await? {
        Some(_) => Ok(()),
        None => Err(CliError::NotSignedIn),
    }
}

async fn load(path: &Path) -> Result<Attachment, CliError> {
    Attachment::from_path(path)
        .await
        .map_err(|source| CliError::Attachment {
            path: path.to_path_buf(),
            source,
        })
}

fn prompt(title: &str, message: &str) -> bool {
    print!("{title}: {message} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_session(session: &SessionStore) {
    let state = session.session();
    match state.phase() {
        SessionPhase::Anonymous | SessionPhase::Authenticating => println!("Not signed in"),
        SessionPhase::PendingApproval(role) => {
            println!("Signed in as {} (waiting for approval)", role.to_str());
        }
        SessionPhase::Onboarding(role) | SessionPhase::Active(role) => {
            println!("Signed in as {}", role.to_str());
        }
    }
    if let Some(message) = &state.error_message {
        println!("{message}");
    }
    println!("Landing page: {}", landing_route(&state).path());
}

fn print_vehicle_row(vehicle: &Vehicle) {
    println!(
        "{}\t{}\t{}\t{}",
        vehicle.id,
        vehicle.vin,
        vehicle.year_brand_model,
        vehicle.status.map_or("-", VehicleStatus::to_str)
    );
}

fn print_vehicle(vehicle: &Vehicle) {
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("id:          {}", vehicle.id);
    println!("vin:         {}", vehicle.vin);
    println!("vehicle:     {}", vehicle.year_brand_model);
    println!("client:      {}", text(&vehicle.client_name));
    println!("type:        {}", text(&vehicle.v_type_name));
    println!("price:       {}", text(&vehicle.price));
    println!("container:   {}", text(&vehicle.container_number));
    println!(
        "arrival:     {}",
        vehicle
            .arrival_date
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    println!("transporter: {}", text(&vehicle.transporter));
    println!("recipient:   {}", text(&vehicle.recipient));
    println!("comment:     {}", text(&vehicle.comment));
    println!(
        "status:      {}",
        vehicle.status.map_or("-", VehicleStatus::to_str)
    );
    for photo in &vehicle.document_photos {
        println!("photo {}:     {}", photo.id, photo.image);
    }
}

fn print_batch_errors(batch: &VehicleBatch) {
    for record in 0..batch.count() {
        let Some(errors) = batch.errors(record) else {
            continue;
        };
        for (field, error) in errors.iter() {
            eprintln!("vehicle {}: {}: {}", record + 1, field.wire_name(), error.message);
        }
    }
}

fn parse_vehicle(value: &str) -> Result<(String, String), String> {
    match value.rsplit_once('=') {
        Some((descriptor, vin)) => Ok((descriptor.trim().to_string(), vin.trim().to_string())),
        None => Err("expected YEAR BRAND MODEL=VIN".to_string()),
    }
}

fn parse_photo(value: &str) -> Result<(usize, PathBuf), String> {
    let (index, path) = value
        .split_once(':')
        .ok_or_else(|| "expected N:PATH".to_string())?;
    let index = index
        .parse()
        .map_err(|err| format!("invalid vehicle number {index:?}: {err}"))?;
    Ok((index, PathBuf::from(path)))
}
