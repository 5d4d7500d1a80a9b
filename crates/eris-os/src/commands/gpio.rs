use eris::command::{Command, CommandRegistry, Invocation};
use eris::error::{Error, Result};
use eris::reply::Reply;
use eris::route::HttpRoute;

use eris_gpio::Edge;
use eris_gpio::chip::Chip;
use eris_gpio::manager::parse_value;

use crate::state::ApiState;

use super::required;

type GpioInvocation<C> = Invocation<ApiState<C>>;

const fn level(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Registers the GPIO commands of the TCP line protocol.
///
/// # Errors
///
/// Fails when a command collides with an already registered one.
pub fn register_line_protocol<C: Chip>(
    registry: &mut CommandRegistry<ApiState<C>>,
) -> Result<()> {
    registry.register(
        Command::new("list-gpio-names", list_names::<C>)
            .abbreviation("lsgp")
            .help("List all GPIO names."),
    )?;
    registry.register(
        Command::new("get-gpio-direction", direction::<C>)
            .abbreviation("ggpd")
            .help("Read the current direction of a GPIO line."),
    )?;
    registry.register(
        Command::new("request-gpio-for-input", request_input::<C>)
            .abbreviation("rgpi")
            .help("Request a given GPIO line for input."),
    )?;
    registry.register(
        Command::new("request-gpio-for-output", request_output::<C>)
            .abbreviation("rgpo")
            .help("Request a given GPIO line for output."),
    )?;
    registry.register(
        Command::new("release-gpio", release::<C>)
            .abbreviation("rlgp")
            .help("Release a previously requested GPIO line."),
    )?;
    registry.register(
        Command::new("read-gpio-value", read_value::<C>)
            .abbreviation("rdgp")
            .help("Read the value from an input GPIO line."),
    )?;
    registry.register(
        Command::new("write-gpio-value", write_value::<C>)
            .abbreviation("wrgp")
            .help("Write a value on an output GPIO line."),
    )?;
    registry.register(
        Command::new("wait-gpio-edge", wait_edge::<C>)
            .abbreviation("wgpe")
            .help("Wait for a specific signal edge on a GPIO line."),
    )?;
    registry.register(
        Command::new("get-test-input-gpio", test_input::<C>)
            .abbreviation("gtig")
            .help("Get a GPIO name suitable for a test in input."),
    )?;
    registry.register(
        Command::new("get-test-output-gpio", test_output::<C>)
            .abbreviation("gtog")
            .help("Get a GPIO name suitable for a test in output."),
    )
}

/// Registers the GPIO routes of the HTTP interface.
///
/// # Errors
///
/// Fails when a command collides with an already registered one.
pub fn register_rest<C: Chip>(registry: &mut CommandRegistry<ApiState<C>>) -> Result<()> {
    registry.register(
        Command::new("list-gpio", list_names::<C>)
            .help("List all GPIO names.")
            .route(HttpRoute::get("/api/gpio/list")),
    )?;
    registry.register(
        Command::new("request-gpio", rest_request::<C>)
            .help("Request a GPIO line for input or for output.")
            .route(HttpRoute::get("/api/gpio").with_parameters(&["name", "direction", "value"])),
    )?;
    registry.register(
        Command::new("release-gpio", rest_release::<C>)
            .help("Release a previously requested GPIO line.")
            .route(HttpRoute::delete("/api/gpio").with_parameters(&["name"])),
    )?;
    registry.register(
        Command::new("get-gpio-direction", rest_direction::<C>)
            .help("Read the current direction of a GPIO line.")
            .route(HttpRoute::get("/api/gpio/direction").with_parameters(&["name"])),
    )?;
    registry.register(
        Command::new("read-gpio-value", rest_read_value::<C>)
            .help("Read the value from an input GPIO line.")
            .route(HttpRoute::get("/api/gpio/value").with_parameters(&["name"])),
    )?;
    registry.register(
        Command::new("write-gpio-value", rest_write_value::<C>)
            .help("Write a value on an output GPIO line.")
            .route(HttpRoute::put("/api/gpio/value").with_parameters(&["name", "value"])),
    )?;
    registry.register(
        Command::new("wait-gpio-edge", rest_wait_edge::<C>)
            .help("Wait for a specific signal edge on a GPIO line.")
            .route(HttpRoute::get("/api/gpio/edge").with_parameters(&["name", "type"])),
    )
}

async fn list_names<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(0)?;
    invocation.state.gpio.names().map(Reply::text)
}

async fn direction<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(1)?;
    let name = invocation.arguments.text(0)?;

    let direction = invocation.state.gpio.direction(name).await?;
    Ok(Reply::text(direction.to_string()))
}

async fn request_input<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(1)?;
    let name = invocation.arguments.text(0)?;

    invocation.state.gpio.request_input(name).await?;
    Ok(Reply::ok())
}

async fn request_output<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(2)?;
    let name = invocation.arguments.text(0)?;
    invocation.state.gpio.find(name)?;
    let value = parse_value(invocation.arguments.text(1)?)?;

    invocation.state.gpio.request_output(name, value).await?;
    Ok(Reply::ok())
}

async fn release<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(1)?;
    let name = invocation.arguments.text(0)?;

    invocation.state.gpio.release(name).await?;
    Ok(Reply::ok())
}

async fn read_value<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(1)?;
    let name = invocation.arguments.text(0)?;

    let value = invocation.state.gpio.read_value(name).await?;
    Ok(Reply::text(level(value)))
}

async fn write_value<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(2)?;
    let name = invocation.arguments.text(0)?;
    invocation.state.gpio.find(name)?;
    let value = parse_value(invocation.arguments.text(1)?)?;

    invocation.state.gpio.write_value(name, value).await?;
    Ok(Reply::ok())
}

async fn wait_edge<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(2)?;
    let name = invocation.arguments.text(0)?;
    invocation.state.gpio.find(name)?;
    let edge = invocation.arguments.text(1)?.parse::<Edge>()?;

    invocation.state.gpio.wait_edge(name, edge).await?;
    Ok(Reply::ok())
}

async fn test_input<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(0)?;
    Ok(invocation
        .state
        .test_gpios
        .input
        .as_deref()
        .map_or_else(Reply::empty, Reply::text))
}

async fn test_output<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(0)?;
    Ok(invocation
        .state
        .test_gpios
        .output
        .as_deref()
        .map_or_else(Reply::empty, Reply::text))
}

async fn rest_request<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;
    let direction = required(&invocation, 1, "Missing GPIO direction.")?;

    let starts_with = |prefix: &str| {
        direction
            .get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
    };
    let output = if starts_with("out") {
        true
    } else if starts_with("in") {
        false
    } else {
        return Err(Error::invalid_argument("Invalid direction"));
    };

    let value = match invocation.arguments.get(2) {
        Some(_) => Some(parse_value(invocation.arguments.text(2)?)?),
        None if output => return Err(Error::invalid_argument("Missing GPIO value.")),
        None => None,
    };

    let gpio = &invocation.state.gpio;
    match value {
        Some(value) if output => gpio.request_output(name, value).await?,
        _ => gpio.request_input(name).await?,
    }

    Ok(Reply::ok())
}

async fn rest_release<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;

    invocation.state.gpio.release(name).await?;
    Ok(Reply::ok())
}

async fn rest_direction<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;

    let direction = invocation.state.gpio.direction(name).await?;
    Ok(Reply::text(direction.to_string()))
}

async fn rest_read_value<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;

    let value = invocation.state.gpio.read_value(name).await?;
    Ok(Reply::text(level(value)))
}

async fn rest_write_value<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;
    invocation.state.gpio.find(name)?;
    let value = parse_value(required(&invocation, 1, "Missing value.")?)?;

    invocation.state.gpio.write_value(name, value).await?;
    Ok(Reply::ok())
}

async fn rest_wait_edge<C: Chip>(invocation: GpioInvocation<C>) -> Result<Reply> {
    let name = required(&invocation, 0, "Missing GPIO name.")?;
    invocation.state.gpio.find(name)?;
    let edge = required(&invocation, 1, "Missing type of event.")?.parse::<Edge>()?;

    invocation.state.gpio.wait_edge(name, edge).await?;
    Ok(Reply::ok())
}
