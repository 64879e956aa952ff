use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use farm_inventory::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::{
        material::{self, ConsumptionType, ContentMeasureCategory},
        UnitOfMeasure,
    },
    services::{
        activity_materials::{
            ActivityMaterialService, AssignMaterialsRequest, MaterialLine, ReturnLine,
            ReturnMaterialsRequest,
        },
        materials::{MaterialService, NewMaterial},
        unit_conversion::{convert_from_base, convert_to_base, parse_unit},
    },
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Convert(args) = &cli.command {
        return handle_convert(args, cli.json);
    }

    let globals = cli.globals();
    let context = CliContext::initialize().await?;
    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
            Ok(())
        }
        Commands::Material(command) => handle_material_command(&context, command, &globals).await,
        Commands::Activity(command) => handle_activity_command(&context, command, &globals).await,
        Commands::Convert(_) => Ok(()),
    }
}

#[derive(Parser)]
#[command(
    name = "farm-inventory",
    about = "Material stock, activity assignments and returns",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, help = "User recorded as the author of stock movements")]
    actor: Option<Uuid>,
    #[command(subcommand)]
    command: Commands,
}

struct Globals {
    json: bool,
    actor: Option<Uuid>,
}

impl Cli {
    fn globals(&self) -> Globals {
        Globals {
            json: self.json,
            actor: self.actor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Convert a quantity to or from its base unit
    Convert(ConvertArgs),
    #[command(subcommand)]
    Material(MaterialCommands),
    #[command(subcommand)]
    Activity(ActivityCommands),
}

#[derive(Args)]
struct ConvertArgs {
    quantity: Decimal,
    #[arg(value_parser = parse_unit_arg)]
    unit: UnitOfMeasure,
    #[arg(long, action = ArgAction::SetTrue, help = "Treat the quantity as base units")]
    from_base: bool,
}

#[derive(Subcommand)]
enum MaterialCommands {
    Register(RegisterMaterialArgs),
    Show(ShowMaterialArgs),
    Receive(ReceiveStockArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ConsumptionArg {
    Consumable,
    Tool,
}

impl From<ConsumptionArg> for ConsumptionType {
    fn from(arg: ConsumptionArg) -> Self {
        match arg {
            ConsumptionArg::Consumable => ConsumptionType::Consumable,
            ConsumptionArg::Tool => ConsumptionType::NonConsumable,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Mass,
    Volume,
    #[value(name = "none")]
    NotMeasured,
}

impl From<CategoryArg> for ContentMeasureCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Mass => ContentMeasureCategory::Mass,
            CategoryArg::Volume => ContentMeasureCategory::Volume,
            CategoryArg::NotMeasured => ContentMeasureCategory::NotMeasured,
        }
    }
}

#[derive(Args)]
struct RegisterMaterialArgs {
    #[arg(long)]
    name: String,
    #[arg(long, value_enum, default_value = "consumable")]
    consumption: ConsumptionArg,
    #[arg(long, value_enum, default_value = "mass")]
    category: CategoryArg,
    #[arg(long, help = "Opening stock")]
    quantity: Decimal,
    #[arg(long, value_parser = parse_unit_arg)]
    unit: UnitOfMeasure,
    #[arg(long, help = "Price of one package")]
    price: Decimal,
    #[arg(long, help = "Content of one package")]
    content: Option<Decimal>,
    #[arg(long, value_parser = parse_unit_arg, help = "Unit of --content; defaults to the base unit")]
    content_unit: Option<UnitOfMeasure>,
    #[arg(long, help = "Uses before a tool unit is depreciated")]
    total_uses: Option<Decimal>,
}

#[derive(Args)]
struct ShowMaterialArgs {
    id: Uuid,
    #[arg(long, action = ArgAction::SetTrue, help = "Include the stock movement history")]
    movements: bool,
}

#[derive(Args)]
struct ReceiveStockArgs {
    id: Uuid,
    #[arg(long)]
    quantity: Decimal,
    #[arg(long, value_parser = parse_unit_arg)]
    unit: UnitOfMeasure,
}

#[derive(Subcommand)]
enum ActivityCommands {
    Assign(AssignArgs),
    Replace(AssignArgs),
    Return(ReturnArgs),
    Release(ActivityIdArgs),
    Show(ActivityIdArgs),
}

#[derive(Args)]
struct AssignArgs {
    activity_id: Uuid,
    #[arg(long)]
    lot: Option<Uuid>,
    #[arg(
        long = "line",
        value_parser = parse_material_line,
        help = "MATERIAL_ID:QUANTITY:UNIT, repeatable"
    )]
    lines: Vec<MaterialLine>,
}

#[derive(Args)]
struct ReturnArgs {
    activity_id: Uuid,
    #[arg(
        long = "line",
        value_parser = parse_return_line,
        required = true,
        help = "MATERIAL_ID:GOOD:DAMAGED[:UNIT], repeatable"
    )]
    lines: Vec<ReturnLine>,
}

#[derive(Args)]
struct ActivityIdArgs {
    activity_id: Uuid,
}

fn parse_unit_arg(value: &str) -> std::result::Result<UnitOfMeasure, String> {
    parse_unit(value).map_err(|e| e.to_string())
}

fn parse_decimal(value: &str, field: &str) -> std::result::Result<Decimal, String> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid {} '{}': {}", field, value, e))
}

fn parse_material_line(value: &str) -> std::result::Result<MaterialLine, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let [material_id, quantity, unit] = parts.as_slice() else {
        return Err(format!("expected MATERIAL_ID:QUANTITY:UNIT, got '{}'", value));
    };
    Ok(MaterialLine {
        material_id: material_id
            .trim()
            .parse()
            .map_err(|e| format!("invalid material id '{}': {}", material_id, e))?,
        quantity: parse_decimal(quantity, "quantity")?,
        unit: parse_unit_arg(unit)?,
    })
}

fn parse_return_line(value: &str) -> std::result::Result<ReturnLine, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let (material_id, good, damaged, unit) = match parts.as_slice() {
        [material_id, good, damaged] => (*material_id, *good, *damaged, None),
        [material_id, good, damaged, unit] => (*material_id, *good, *damaged, Some(*unit)),
        _ => {
            return Err(format!(
                "expected MATERIAL_ID:GOOD:DAMAGED[:UNIT], got '{}'",
                value
            ))
        }
    };
    Ok(ReturnLine {
        material_id: material_id
            .trim()
            .parse()
            .map_err(|e| format!("invalid material id '{}': {}", material_id, e))?,
        returned_good: parse_decimal(good, "good quantity")?,
        returned_damaged: parse_decimal(damaged, "damaged quantity")?,
        unit: unit.map(parse_unit_arg).transpose()?,
    })
}

struct CliContext {
    _config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            _config: config,
            db: Arc::new(db_pool),
        })
    }

    fn material_service(&self) -> MaterialService {
        MaterialService::new(self.db.clone())
    }

    fn activity_service(&self) -> ActivityMaterialService {
        ActivityMaterialService::new(self.db.clone())
    }
}

#[derive(Serialize)]
struct Conversion {
    quantity: Decimal,
    unit: UnitOfMeasure,
    base_quantity: Decimal,
}

fn handle_convert(args: &ConvertArgs, json: bool) -> Result<()> {
    let conversion = if args.from_base {
        Conversion {
            quantity: convert_from_base(args.quantity, args.unit)?,
            unit: args.unit,
            base_quantity: args.quantity,
        }
    } else {
        Conversion {
            quantity: args.quantity,
            unit: args.unit,
            base_quantity: convert_to_base(args.quantity, args.unit)?,
        }
    };

    if json {
        print_json(&conversion)?;
    } else {
        println!(
            "{} {} = {} base units",
            conversion.quantity.normalize(),
            conversion.unit,
            conversion.base_quantity.normalize()
        );
    }
    Ok(())
}

async fn handle_material_command(
    context: &CliContext,
    command: MaterialCommands,
    globals: &Globals,
) -> Result<()> {
    let service = context.material_service();
    match command {
        MaterialCommands::Register(args) => {
            let material = service
                .register_material(
                    NewMaterial {
                        name: args.name,
                        consumption_type: args.consumption.into(),
                        content_measure_category: args.category.into(),
                        quantity: args.quantity,
                        unit: args.unit,
                        price_per_package: args.price,
                        content_per_package: args.content,
                        content_unit: args.content_unit,
                        total_uses_per_unit: args.total_uses,
                    },
                    globals.actor,
                )
                .await
                .context("failed to register material")?;
            if globals.json {
                print_json(&material)?;
            } else {
                render_material(&material);
            }
        }
        MaterialCommands::Show(args) => {
            let material = service
                .get_material(args.id)
                .await
                .with_context(|| format!("failed to fetch material {}", args.id))?;
            let movements = if args.movements {
                Some(service.list_movements(args.id).await?)
            } else {
                None
            };
            if globals.json {
                print_json(&serde_json::json!({ "material": material, "movements": movements }))?;
            } else {
                render_material(&material);
                for movement in movements.unwrap_or_default() {
                    println!(
                        "  {:?} {} • {} • {}",
                        movement.movement_type,
                        movement.amount.normalize(),
                        movement.reason,
                        movement.created_at
                    );
                }
            }
        }
        MaterialCommands::Receive(args) => {
            let material = service
                .receive_stock(args.id, args.quantity, args.unit, globals.actor)
                .await
                .with_context(|| format!("failed to receive stock for {}", args.id))?;
            if globals.json {
                print_json(&material)?;
            } else {
                render_material(&material);
            }
        }
    }
    Ok(())
}

async fn handle_activity_command(
    context: &CliContext,
    command: ActivityCommands,
    globals: &Globals,
) -> Result<()> {
    let service = context.activity_service();
    match command {
        ActivityCommands::Assign(args) => {
            let outcome = service
                .assign_materials(AssignMaterialsRequest {
                    activity_id: args.activity_id,
                    lot_id: args.lot,
                    actor_id: globals.actor,
                    materials: args.lines,
                })
                .await
                .context("failed to assign materials")?;
            if globals.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Assigned {} material(s) to activity {}",
                    outcome.assignments.len(),
                    outcome.activity_id
                );
                for expense in &outcome.expenses {
                    println!("  {:?} {} • {}", expense.category, expense.amount, expense.description);
                }
            }
            Ok(())
        }
        ActivityCommands::Replace(args) => {
            let outcome = service
                .replace_materials(AssignMaterialsRequest {
                    activity_id: args.activity_id,
                    lot_id: args.lot,
                    actor_id: globals.actor,
                    materials: args.lines,
                })
                .await
                .context("failed to replace activity materials")?;
            if globals.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Activity {} now has {} material(s)",
                    outcome.activity_id,
                    outcome.assignments.len()
                );
            }
            Ok(())
        }
        ActivityCommands::Return(args) => {
            let outcome = service
                .return_materials(ReturnMaterialsRequest {
                    activity_id: args.activity_id,
                    actor_id: globals.actor,
                    lines: args.lines,
                })
                .await
                .context("failed to return materials")?;
            if globals.json {
                print_json(&outcome)?;
            } else {
                for result in &outcome.reconciled {
                    println!(
                        "- material {} • consumed {} • returned {} good / {} damaged",
                        result.material_id,
                        result.consumed_base.normalize(),
                        result.good_base.normalize(),
                        result.damaged_base.normalize()
                    );
                }
                for skipped in &outcome.skipped {
                    println!("- material {} skipped ({:?})", skipped.material_id, skipped.reason);
                }
            }
            Ok(())
        }
        ActivityCommands::Release(args) => {
            let outcome = service
                .release_materials(args.activity_id, globals.actor)
                .await
                .context("failed to release activity materials")?;
            if globals.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Released {} assignment(s) of activity {} ({} reverted)",
                    outcome.removed, outcome.activity_id, outcome.reverted
                );
            }
            Ok(())
        }
        ActivityCommands::Show(args) => {
            let assignments = service.list_assignments(args.activity_id).await?;
            let expenses = service.list_expenses(args.activity_id).await?;
            if globals.json {
                print_json(&serde_json::json!({
                    "assignments": assignments,
                    "expenses": expenses,
                }))?;
            } else {
                for a in &assignments {
                    println!(
                        "- material {} • {} {} ({} base) • cost {}{}",
                        a.material_id,
                        a.quantity_display.normalize(),
                        a.unit_of_measure,
                        a.quantity_base.normalize(),
                        a.cost,
                        if a.is_reconciled() { " • reconciled" } else { "" }
                    );
                }
                for e in &expenses {
                    println!("  {:?} {:?} {} • {}", e.direction, e.category, e.amount, e.description);
                }
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_material(material: &material::Model) {
    println!(
        "- Material {} • {} • {} {} • price/package {}",
        material.id,
        material.name,
        material.quantity.normalize(),
        material.base_unit.as_unit(),
        material.price_per_package
    );
}
