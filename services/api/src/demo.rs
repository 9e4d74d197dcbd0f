use chrono::Utc;
use clap::Args;
use listing_lifecycle::config::ConfigError;
use listing_lifecycle::error::AppError;
use listing_lifecycle::workflows::listing::moderation::{DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE};
use listing_lifecycle::workflows::listing::{
    AuditEntry, AuditObserver, AuditSink, ChangeObserver, ChannelTransports, DeliveryError,
    Listing, ListingContent, ListingServiceError, ListingStateMachine, MessageTransport,
    ModerationConfig, NotificationChannel, NotificationObserver, Operation, PriceRange, Property,
    User, UserRole, ValidationPipeline,
};
use std::sync::Arc;

const DEMO_FORBIDDEN_TERMS: [&str; 2] = ["golpe", "urgente"];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Term that moderation rejects (repeatable). Defaults to a small demo list.
    #[arg(long = "forbidden-term")]
    pub(crate) forbidden_terms: Vec<String>,
    /// Lowest accepted price, inclusive
    #[arg(long)]
    pub(crate) min_price: Option<u64>,
    /// Highest accepted price, inclusive
    #[arg(long)]
    pub(crate) max_price: Option<u64>,
}

impl DemoArgs {
    fn moderation(&self) -> Result<ModerationConfig, ConfigError> {
        let min = self.min_price.unwrap_or(DEFAULT_MIN_PRICE);
        let max = self.max_price.unwrap_or(DEFAULT_MAX_PRICE);
        if min > max {
            return Err(ConfigError::InvalidPriceRange { min, max });
        }

        let forbidden_terms = if self.forbidden_terms.is_empty() {
            DEMO_FORBIDDEN_TERMS.iter().map(|term| term.to_string()).collect()
        } else {
            self.forbidden_terms.clone()
        };

        Ok(ModerationConfig {
            forbidden_terms,
            price_range: PriceRange { min, max },
        })
    }
}

/// Prints each delivery instead of sending it.
#[derive(Debug)]
struct ConsoleTransport {
    channel: NotificationChannel,
}

impl MessageTransport for ConsoleTransport {
    fn deliver(&self, recipient: &str, text: &str) -> Result<(), DeliveryError> {
        println!("    notify [{}] {}: {}", self.channel, recipient, text);
        Ok(())
    }
}

#[derive(Debug)]
struct ConsoleAuditSink;

impl AuditSink for ConsoleAuditSink {
    fn name(&self) -> &str {
        "console"
    }

    fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        println!("    audit  {}", entry.render());
        Ok(())
    }
}

fn console_observers() -> Vec<Arc<dyn ChangeObserver>> {
    let transport = |channel| -> Arc<dyn MessageTransport> {
        Arc::new(ConsoleTransport { channel })
    };
    let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(ConsoleAuditSink)];

    vec![
        Arc::new(AuditObserver::new(sinks)),
        Arc::new(NotificationObserver::new(ChannelTransports::new(
            transport(NotificationChannel::Email),
            transport(NotificationChannel::Sms),
            transport(NotificationChannel::Chat),
        ))),
    ]
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let moderation = args.moderation()?;
    let machine = ListingStateMachine::new(ValidationPipeline::from_config(&moderation));
    let observers = console_observers();

    println!("Listing lifecycle demo ({})", Utc::now().format("%Y-%m-%d"));
    println!(
        "Moderation: forbidden terms [{}], price {}..={}",
        moderation.forbidden_terms.join(", "),
        moderation.price_range.min,
        moderation.price_range.max
    );

    println!("\n1. Clean listing approved and sold");
    let mut listing = demo_listing(
        "Apartamento T2 renovado com varanda",
        350_000,
        advertiser(NotificationChannel::Email),
        &observers,
    )?;
    for operation in [Operation::Submit, Operation::Approve, Operation::Sell] {
        step(&machine, &mut listing, operation);
    }
    summarize(&listing);

    println!("\n2. Forbidden term rejected, revised and resubmitted");
    let mut listing = demo_listing(
        "Venda urgente, negócio da China",
        280_000,
        advertiser(NotificationChannel::Sms),
        &observers,
    )?;
    for operation in [Operation::Submit, Operation::Approve, Operation::Revise] {
        step(&machine, &mut listing, operation);
    }
    listing.set_description(Some(
        "Moradia com jardim, pronta a habitar".to_string(),
    ));
    println!("  description revised");
    for operation in [Operation::Submit, Operation::Approve] {
        step(&machine, &mut listing, operation);
    }
    summarize(&listing);

    println!("\n3. Price outside the accepted range");
    let mut chat_user = advertiser(NotificationChannel::Chat);
    chat_user.chat_handle = Some("@imobiliaria.lisboa".to_string());
    let mut listing = demo_listing(
        "Palacete histórico no centro",
        moderation.price_range.max.saturating_add(1_500_000),
        chat_user,
        &observers,
    )?;
    for operation in [Operation::Submit, Operation::Approve, Operation::Revise] {
        step(&machine, &mut listing, operation);
    }
    listing
        .set_price(moderation.price_range.max)
        .map_err(ListingServiceError::from)?;
    println!("  price lowered to {}", listing.content().price);
    for operation in [Operation::Submit, Operation::Approve, Operation::Sell] {
        step(&machine, &mut listing, operation);
    }
    summarize(&listing);

    Ok(())
}

fn step(machine: &ListingStateMachine, listing: &mut Listing, operation: Operation) {
    println!("  > {operation}");
    match machine.apply(listing, operation) {
        Ok(outcome) => match &outcome.rejection {
            Some(rejection) => println!(
                "    {} -> {} (rejected by {}: {})",
                outcome.from, outcome.to, rejection.rule, rejection.reason
            ),
            None => println!("    {} -> {}", outcome.from, outcome.to),
        },
        Err(err) => println!("    refused: {err}"),
    }
}

fn summarize(listing: &Listing) {
    let next: Vec<&str> = listing
        .state()
        .allowed_operations()
        .into_iter()
        .map(Operation::name)
        .collect();
    println!(
        "  {} is {}; next operations: {}",
        listing.id(),
        listing.state(),
        if next.is_empty() {
            "none".to_string()
        } else {
            next.join(", ")
        }
    );
}

fn demo_listing(
    description: &str,
    price: u64,
    advertiser: User,
    observers: &[Arc<dyn ChangeObserver>],
) -> Result<Listing, AppError> {
    let mut listing = Listing::new(
        ListingContent {
            title: "Imóvel em Lisboa".to_string(),
            price,
            description: Some(description.to_string()),
            photos: vec!["photos/demo/front.jpg".to_string()],
        },
        Arc::new(Property {
            area_sq_m: 95.0,
            address: "Avenida da Liberdade 100".to_string(),
            city: "Lisboa".to_string(),
        }),
        Arc::new(advertiser),
    )
    .map_err(ListingServiceError::from)?;

    for observer in observers {
        listing.register_observer(Arc::clone(observer));
    }
    Ok(listing)
}

fn advertiser(channel: NotificationChannel) -> User {
    User {
        id: "usr-demo".to_string(),
        name: "Marta Silva".to_string(),
        role: UserRole::Owner,
        email: Some("marta@example.pt".to_string()),
        phone: Some("+351930000000".to_string()),
        chat_handle: None,
        channel: Some(channel),
    }
}
