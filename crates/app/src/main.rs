use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    Currency, Engine, EngineError, Money, NewBankDetailCmd, NewOfferCmd, NewRequestCmd, Offer,
    OfferListFilter, Party, RateCmd, RateSnapshot, SettlementStep, Transaction,
};
use migration::{Migrator, MigratorTrait};
use settings::{Database, Settings};
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "swapboard")]
#[command(about = "Invite-only peer-to-peer currency exchange board")]
struct Cli {
    /// Settings file (defaults to `settings.toml` when present).
    #[arg(long)]
    config: Option<String>,

    /// Database connection string, overrides `[database]` (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    BankDetail(BankDetail),
    Offer(OfferArgs),
    Request(Request),
    Deal(Deal),
    Rating(Rating),
    Rates(Rates),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Creates a root user, outside of the invitation tree.
    CreateRoot {
        #[arg(long)]
        username: String,
    },
    /// Issues a single-use invitation code.
    Invite {
        #[arg(long)]
        inviter: String,
    },
    Register {
        #[arg(long)]
        code: Uuid,
        #[arg(long)]
        username: String,
    },
    Show {
        #[arg(long)]
        username: String,
    },
    Invitations {
        #[arg(long)]
        inviter: String,
    },
    /// Handshake distance between two users in the referral tree.
    Distance { a: String, b: String },
}

#[derive(Args, Debug)]
struct BankDetail {
    #[command(subcommand)]
    command: BankDetailCommand,
}

#[derive(Subcommand, Debug)]
enum BankDetailCommand {
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        currency: Currency,
        #[arg(long)]
        bank_name: Option<String>,
        #[arg(long)]
        account_or_phone: Option<String>,
        #[arg(long)]
        recipient_name: Option<String>,
    },
    List {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
struct OfferArgs {
    #[command(subcommand)]
    command: OfferCommand,
}

#[derive(Subcommand, Debug)]
enum OfferCommand {
    Create {
        #[arg(long)]
        author: String,
        /// Currency offered, e.g. `USD`.
        #[arg(long)]
        offered: Currency,
        /// Decimal amount, e.g. `12.50`.
        #[arg(long)]
        amount: Money,
        #[arg(long)]
        needed: Currency,
        #[arg(long)]
        bank_detail: Option<Uuid>,
    },
    List {
        /// Include offers that are no longer open.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        limit: Option<u64>,
    },
    Show {
        id: Uuid,
    },
    /// Amount the counterparty owes, at the latest rates.
    Counterparty {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct Request {
    #[command(subcommand)]
    command: RequestCommand,
}

#[derive(Subcommand, Debug)]
enum RequestCommand {
    Submit {
        #[arg(long)]
        offer: Uuid,
        #[arg(long)]
        applicant: String,
        #[arg(long)]
        bank_detail: Option<Uuid>,
    },
    Accept {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
    Reject {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
    List {
        #[arg(long)]
        offer: Uuid,
        #[arg(long)]
        actor: String,
    },
    /// Takes an open offer directly, without a request.
    Start {
        #[arg(long)]
        offer: Uuid,
        #[arg(long)]
        actor: String,
    },
}

#[derive(Args, Debug)]
struct Deal {
    #[command(subcommand)]
    command: DealCommand,
}

#[derive(Subcommand, Debug)]
enum DealCommand {
    Show {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
    Step {
        id: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long, value_enum)]
        step: StepArg,
    },
    Evidence {
        id: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long, value_enum)]
        role: PartyArg,
        /// Reference to the uploaded receipt.
        #[arg(long)]
        image: String,
    },
    Dispute {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
    Comment {
        id: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        text: String,
    },
    Comments {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StepArg {
    AuthorSent,
    AcceptingReceived,
    AcceptingSent,
    AuthorReceived,
}

impl From<StepArg> for SettlementStep {
    fn from(value: StepArg) -> Self {
        match value {
            StepArg::AuthorSent => SettlementStep::AuthorAssertsTransferDone,
            StepArg::AcceptingReceived => SettlementStep::AcceptingUserConfirmsMoneyReceived,
            StepArg::AcceptingSent => SettlementStep::AcceptingUserAssertsTransferDone,
            StepArg::AuthorReceived => SettlementStep::AuthorConfirmsMoneyReceived,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PartyArg {
    Author,
    AcceptingUser,
}

impl From<PartyArg> for Party {
    fn from(value: PartyArg) -> Self {
        match value {
            PartyArg::Author => Party::Author,
            PartyArg::AcceptingUser => Party::AcceptingUser,
        }
    }
}

#[derive(Args, Debug)]
struct Rating {
    #[command(subcommand)]
    command: RatingCommand,
}

#[derive(Subcommand, Debug)]
enum RatingCommand {
    Give {
        #[arg(long)]
        transaction: Uuid,
        #[arg(long)]
        rater: String,
        #[arg(long)]
        ratee: String,
        #[arg(long)]
        score: i32,
        #[arg(long)]
        comment: Option<String>,
    },
    List {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
struct Rates {
    #[command(subcommand)]
    command: RatesCommand,
}

#[derive(Subcommand, Debug)]
enum RatesCommand {
    Record {
        #[arg(long)]
        usd_rub: f64,
        #[arg(long)]
        rub_mnt: f64,
        #[arg(long)]
        usd_mnt: f64,
        #[arg(long)]
        usd_rub_alternative: Option<f64>,
    },
    Latest,
    NeedRefresh,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "swapboard={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = match &cli.database_url {
        Some(url) => connect(url).await?,
        None => parse_database(&settings.database).await?,
    };
    let engine = Engine::builder()
        .database(db)
        .offer_limits(settings.offer_limits()?)
        .invites_per_user(settings.marketplace.invites_per_user)
        .rate_max_age(settings.rate_max_age()?)
        .build()
        .await?;

    let outcome = match cli.command {
        Command::User(User { command }) => run_user(&engine, command).await,
        Command::BankDetail(BankDetail { command }) => run_bank_detail(&engine, command).await,
        Command::Offer(OfferArgs { command }) => run_offer(&engine, command).await,
        Command::Request(Request { command }) => run_request(&engine, command).await,
        Command::Deal(Deal { command }) => run_deal(&engine, command).await,
        Command::Rating(Rating { command }) => run_rating(&engine, command).await,
        Command::Rates(Rates { command }) => run_rates(&engine, command).await,
    };

    // Rule violations are reported plainly; storage failures bubble up.
    if let Err(err) = &outcome
        && let Some(engine_err) = err.downcast_ref::<EngineError>()
        && engine_err.is_user_facing()
    {
        eprintln!("{engine_err}");
        std::process::exit(1);
    }
    outcome
}

async fn run_user(engine: &Engine, command: UserCommand) -> AppResult<()> {
    match command {
        UserCommand::CreateRoot { username } => {
            let user = engine.create_root_user(&username).await?;
            println!("created root user: {} ({})", user.username, user.referral_code);
        }
        UserCommand::Invite { inviter } => {
            let invitation = engine.create_invitation(&inviter).await?;
            let left = engine.user(&inviter).await?.invites_left;
            println!("invitation code: {} ({left} left)", invitation.code);
        }
        UserCommand::Register { code, username } => {
            let user = engine.register_with_invitation(code, &username).await?;
            println!(
                "registered: {} ({}), invited by {}",
                user.username,
                user.referral_code,
                user.invited_by.as_deref().unwrap_or("-")
            );
        }
        UserCommand::Show { username } => {
            let user = engine.user(&username).await?;
            println!(
                "{} code={} root={} invites_left={} rating={:.2}",
                user.username,
                user.referral_code,
                user.is_root,
                user.invites_left,
                user.aggregated_rating
            );
        }
        UserCommand::Invitations { inviter } => {
            for invitation in engine.list_invitations(&inviter).await? {
                println!(
                    "{} used_by={}",
                    invitation.code,
                    invitation.invited_user.as_deref().unwrap_or("-")
                );
            }
        }
        UserCommand::Distance { a, b } => {
            println!("{}", engine.handshake_distance_between(&a, &b).await?);
        }
    }
    Ok(())
}

async fn run_bank_detail(engine: &Engine, command: BankDetailCommand) -> AppResult<()> {
    match command {
        BankDetailCommand::Add {
            user,
            currency,
            bank_name,
            account_or_phone,
            recipient_name,
        } => {
            let mut cmd = NewBankDetailCmd::new(user, currency);
            if let Some(bank_name) = bank_name {
                cmd = cmd.bank_name(bank_name);
            }
            if let Some(account_or_phone) = account_or_phone {
                cmd = cmd.account_or_phone(account_or_phone);
            }
            if let Some(recipient_name) = recipient_name {
                cmd = cmd.recipient_name(recipient_name);
            }
            let detail = engine.add_bank_detail(cmd).await?;
            println!("added bank detail: {} ({})", detail.id, detail.currency);
        }
        BankDetailCommand::List { user } => {
            for detail in engine.bank_details(&user).await? {
                println!(
                    "{} {} bank={} account={} recipient={}",
                    detail.id,
                    detail.currency,
                    detail.bank_name.as_deref().unwrap_or("-"),
                    detail.account_or_phone.as_deref().unwrap_or("-"),
                    detail.recipient_name.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn run_offer(engine: &Engine, command: OfferCommand) -> AppResult<()> {
    match command {
        OfferCommand::Create {
            author,
            offered,
            amount,
            needed,
            bank_detail,
        } => {
            let mut cmd = NewOfferCmd::new(author, offered, amount, needed, Utc::now());
            if let Some(bank_detail) = bank_detail {
                cmd = cmd.bank_detail(bank_detail);
            }
            let offer = engine.create_offer(cmd).await?;
            println!("created offer: {}", offer.id);
        }
        OfferCommand::List { all, author, limit } => {
            let mut filter = if all {
                OfferListFilter::default()
            } else {
                OfferListFilter::open()
            };
            if let Some(author) = author {
                filter = filter.author(author);
            }
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }
            for offer in engine.list_offers(filter).await? {
                print_offer(&offer);
            }
        }
        OfferCommand::Show { id } => {
            let offer = engine.offer(id).await?;
            print_offer(&offer);
            if let Some(tx) = engine.transaction_for_offer(id).await? {
                println!("transaction: {} ({})", tx.id, tx.status.as_str());
            }
        }
        OfferCommand::Counterparty { id } => {
            let offer = engine.offer(id).await?;
            match engine.counterparty_amount(id).await? {
                Some(amount) => println!("{}", amount.display_in(offer.currency_needed)),
                None => println!("no usable exchange rates"),
            }
        }
    }
    Ok(())
}

async fn run_request(engine: &Engine, command: RequestCommand) -> AppResult<()> {
    match command {
        RequestCommand::Submit {
            offer,
            applicant,
            bank_detail,
        } => {
            let mut cmd = NewRequestCmd::new(offer, applicant, Utc::now());
            if let Some(bank_detail) = bank_detail {
                cmd = cmd.bank_detail(bank_detail);
            }
            let request = engine.submit_request(cmd).await?;
            println!("submitted request: {}", request.id);
        }
        RequestCommand::Accept { id, actor } => {
            let tx = engine.accept_request(id, &actor).await?;
            println!("accepted, transaction: {}", tx.id);
        }
        RequestCommand::Reject { id, actor } => {
            let request = engine.reject_request(id, &actor).await?;
            println!("request {} is {}", request.id, request.status.as_str());
        }
        RequestCommand::List { offer, actor } => {
            for request in engine.requests_for_offer(offer, &actor).await? {
                println!(
                    "{} {} {} {}",
                    request.id,
                    request.applicant,
                    request.status.as_str(),
                    request.applied_at
                );
            }
        }
        RequestCommand::Start { offer, actor } => {
            let tx = engine.start_transaction(offer, &actor).await?;
            println!("started transaction: {}", tx.id);
        }
    }
    Ok(())
}

async fn run_deal(engine: &Engine, command: DealCommand) -> AppResult<()> {
    match command {
        DealCommand::Show { id, actor } => print_transaction(&engine.transaction(id, &actor).await?),
        DealCommand::Step { id, actor, step } => {
            let tx = engine
                .apply_settlement_step(id, &actor, step.into())
                .await?;
            print_transaction(&tx);
        }
        DealCommand::Evidence {
            id,
            actor,
            role,
            image,
        } => {
            let tx = engine.upload_evidence(id, &actor, role.into(), &image).await?;
            print_transaction(&tx);
        }
        DealCommand::Dispute { id, actor } => {
            print_transaction(&engine.open_dispute(id, &actor).await?)
        }
        DealCommand::Comment { id, actor, text } => {
            let comment = engine.add_comment(id, &actor, &text).await?;
            println!("comment added: {}", comment.id);
        }
        DealCommand::Comments { id, actor } => {
            for comment in engine.comments(id, &actor).await? {
                println!("[{}] {}: {}", comment.created_at, comment.author, comment.content);
            }
        }
    }
    Ok(())
}

async fn run_rating(engine: &Engine, command: RatingCommand) -> AppResult<()> {
    match command {
        RatingCommand::Give {
            transaction,
            rater,
            ratee,
            score,
            comment,
        } => {
            let mut cmd = RateCmd::new(transaction, rater, ratee, score, Utc::now());
            if let Some(comment) = comment {
                cmd = cmd.comment(comment);
            }
            let rating = engine.rate(cmd).await?;
            let user = engine.user(&rating.recipient).await?;
            println!(
                "rated {} with {}, now at {:.2}",
                user.username, rating.score, user.aggregated_rating
            );
        }
        RatingCommand::List { user } => {
            for rating in engine.ratings_for(&user).await? {
                println!(
                    "{} by {} on {}: {}",
                    rating.score,
                    rating.author,
                    rating.transaction_id,
                    rating.comment.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

async fn run_rates(engine: &Engine, command: RatesCommand) -> AppResult<()> {
    match command {
        RatesCommand::Record {
            usd_rub,
            rub_mnt,
            usd_mnt,
            usd_rub_alternative,
        } => {
            let snapshot = engine
                .record_rates(RateSnapshot::new(
                    usd_rub,
                    rub_mnt,
                    usd_mnt,
                    usd_rub_alternative,
                    Utc::now(),
                ))
                .await?;
            println!("recorded rates at {}", snapshot.fetched_at);
        }
        RatesCommand::Latest => match engine.latest_rates().await? {
            Some(rates) => println!(
                "USD/RUB={} RUB/MNT={} USD/MNT={} fetched_at={}",
                rates.usd_rub, rates.rub_mnt, rates.usd_mnt, rates.fetched_at
            ),
            None => println!("no rates recorded"),
        },
        RatesCommand::NeedRefresh => {
            println!("{}", engine.rates_need_refresh(Utc::now()).await?);
        }
    }
    Ok(())
}

fn print_offer(offer: &Offer) {
    println!(
        "{} {} offers {} for {} [{}]",
        offer.id,
        offer.author,
        offer.amount_offered.display_in(offer.currency_offered),
        offer.currency_needed,
        offer.status.as_str()
    );
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{} offer={} accepting_user={} status={} stage={}",
        tx.id,
        tx.offer_id,
        tx.accepting_user,
        tx.status.as_str(),
        tx.stage().as_str()
    );
}

async fn connect(url: &str) -> AppResult<sea_orm::DatabaseConnection> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::debug!("database ready");
    Ok(database)
}

async fn parse_database(config: &Database) -> AppResult<sea_orm::DatabaseConnection> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };
    connect(&url).await
}
