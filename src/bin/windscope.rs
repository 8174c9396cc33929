use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use windscope::engine::{ConditionSource, SolveRequest};
use windscope::link::{LinkReport, LinkState};
use windscope::protocol::{Request, RequestType, Response, ResponseResult};
use windscope::wire::TelemetryMessage;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("windscope")
        .version("0.1.0")
        .author("Field Systems Engineering Team")
        .about("🌬️  Windscope - Field ballistics solver with live wind telemetry")
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .value_name("HOST")
                .help("Server host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("ping")
                .about("🏓 Test connection to the solver service")
        )
        .subcommand(
            SubCommand::with_name("solve")
                .about("🎯 Compute a firing solution")
                .arg(
                    Arg::with_name("bc")
                        .long("bc")
                        .value_name("BC")
                        .help("Ballistic coefficient (G7)")
                        .takes_value(true)
                        .required(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("velocity")
                        .long("velocity")
                        .value_name("FPS")
                        .help("Muzzle velocity in feet per second")
                        .takes_value(true)
                        .required(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("range")
                        .long("range")
                        .value_name("YDS")
                        .help("Target range in yards")
                        .takes_value(true)
                        .required(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("temp")
                        .long("temp")
                        .value_name("F")
                        .help("Air temperature in Fahrenheit")
                        .takes_value(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("pressure")
                        .long("pressure")
                        .value_name("INHG")
                        .help("Station pressure in inches of mercury")
                        .takes_value(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("wind-speed")
                        .long("wind-speed")
                        .value_name("MPH")
                        .help("Wind speed in miles per hour")
                        .takes_value(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("wind-direction")
                        .long("wind-direction")
                        .value_name("DEG")
                        .help("Bearing the wind blows from, 0-359 (90 = from the right)")
                        .takes_value(true)
                        .validator(is_number),
                )
                .arg(
                    Arg::with_name("auto")
                        .long("auto")
                        .help("Take wind, temperature, and pressure from live telemetry"),
                )
                .arg(
                    Arg::with_name("points")
                        .long("points")
                        .value_name("N")
                        .help("Number of points in the solution arrays")
                        .takes_value(true)
                        .validator(is_count),
                ),
        )
        .subcommand(
            SubCommand::with_name("env")
                .about("🌡️  Show the latest environmental reading and link health")
        )
        .subcommand(
            SubCommand::with_name("messages")
                .about("📬 Drain and display buffered telemetry messages")
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Show solver, cache, store, and link statistics")
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;
    let format = matches.value_of("format").unwrap_or("table");

    match matches.subcommand() {
        ("ping", _) => {
            let response = send_request(host, port, RequestType::Ping).await?;
            print_ping(&response, format);
        }
        ("solve", Some(sub_matches)) => {
            let solve = build_solve_request(sub_matches)?;
            let response = send_request(host, port, RequestType::Solve(solve)).await?;
            print_solution(&response, format);
        }
        ("env", _) => {
            let response = send_request(host, port, RequestType::Environment).await?;
            print_environment(&response, format);
        }
        ("messages", _) => {
            let response = send_request(host, port, RequestType::Messages).await?;
            print_messages(&response, format);
        }
        ("status", _) => {
            let response = send_request(host, port, RequestType::Status).await?;
            print_status(&response, format);
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Test connection", "windscope ping".bright_cyan());
            println!(
                "  {} Solve with live wind",
                "windscope solve --bc 0.25 --velocity 2700 --range 600 --auto".bright_cyan()
            );
            println!("  {} Watch the sensor link", "windscope env".bright_cyan());
        }
    }

    Ok(())
}

fn is_number(value: String) -> Result<(), String> {
    value
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| "must be a number".to_string())
}

fn is_count(value: String) -> Result<(), String> {
    value
        .parse::<usize>()
        .map(|_| ())
        .map_err(|_| "must be a whole number".to_string())
}

fn build_solve_request(
    matches: &ArgMatches<'_>,
) -> Result<SolveRequest, Box<dyn std::error::Error>> {
    Ok(SolveRequest {
        bc_g7: matches.value_of("bc").unwrap().parse()?,
        muzzle_velocity_fps: matches.value_of("velocity").unwrap().parse()?,
        range_yds: matches.value_of("range").unwrap().parse()?,
        temp_f: parse_optional(matches.value_of("temp"))?,
        pressure_inhg: parse_optional(matches.value_of("pressure"))?,
        wind_speed_mph: parse_optional(matches.value_of("wind-speed"))?,
        wind_direction_deg: parse_optional(matches.value_of("wind-direction"))?,
        use_telemetry: matches.is_present("auto"),
        sample_points: match matches.value_of("points") {
            Some(value) => Some(value.parse()?),
            None => None,
        },
    })
}

fn parse_optional(value: Option<&str>) -> Result<Option<f64>, std::num::ParseFloatError> {
    match value {
        Some(text) => Ok(Some(text.parse()?)),
        None => Ok(None),
    }
}

async fn send_request(
    host: &str,
    port: u16,
    request_type: RequestType,
) -> Result<Response, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to the solver at {}",
                "❌".red(),
                addr.bright_white()
            );
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "cargo run --bin windscope-server".bright_cyan());
            }
            return Err(e.into());
        }
    };

    let request = Request {
        id: 1,
        request_type,
    };
    let request_json = serde_json::to_string(&request)?;

    let response_line = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        let (reader, mut writer) = stream.into_split();
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();
        let n = buf_reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Server closed connection",
            ));
        }
        Ok(line)
    })
    .await??;

    Ok(serde_json::from_str(response_line.trim())?)
}

fn print_ping(response: &Response, format: &str) {
    if format == "json" {
        print_json(response);
        return;
    }
    match &response.result {
        ResponseResult::Pong => {
            println!("{} {}", "🏓".green(), "Pong! Solver is responsive.".bright_green());
        }
        other => print_unexpected(other),
    }
}

fn print_solution(response: &Response, format: &str) {
    if format == "json" {
        print_json(response);
        return;
    }
    match &response.result {
        ResponseResult::Solution(solution) => {
            let target_range = solution.range_yds.last().copied().unwrap_or(0.0);
            if format == "compact" {
                println!(
                    "{:.1} yd: drop {:.3} MOA, wind {:.3} MOA, {:.3} s, {:.1} fps",
                    target_range,
                    solution.drop_moa,
                    solution.windage_moa,
                    solution.time_of_flight_sec,
                    solution.velocity_at_target_fps
                );
                return;
            }

            println!("{}", "🎯 Firing Solution".bright_green().bold());
            println!(
                "  {:<12} {:.3} MOA",
                "Drop:".bright_white(),
                solution.drop_moa
            );
            println!(
                "  {:<12} {:.3} MOA",
                "Windage:".bright_white(),
                solution.windage_moa
            );
            println!(
                "  {:<12} {:.3} s",
                "Flight:".bright_white(),
                solution.time_of_flight_sec
            );
            println!(
                "  {:<12} {:.1} fps",
                "Impact vel:".bright_white(),
                solution.velocity_at_target_fps
            );

            let applied = &solution.applied;
            let source = match applied.source {
                ConditionSource::Telemetry => "telemetry".bright_cyan(),
                ConditionSource::Manual => "manual".normal(),
            };
            println!("{}", "🌬️  Applied Conditions".bright_green().bold());
            println!(
                "  {:.1} mph @ {:.0}°, {:.1} °F, {:.2} inHg ({})",
                applied.wind_speed_mph,
                applied.wind_direction_deg,
                applied.temperature_f,
                applied.pressure_inhg,
                source
            );

            println!(
                "{:>10} {:>11} {:>11} {:>9} {:>10}",
                "Range(yd)".bright_white(),
                "Drop(MOA)".bright_white(),
                "Wind(MOA)".bright_white(),
                "Time(s)".bright_white(),
                "Vel(fps)".bright_white()
            );
            for i in 0..solution.range_yds.len() {
                println!(
                    "{:>10.1} {:>11.3} {:>11.3} {:>9.3} {:>10.1}",
                    solution.range_yds[i],
                    solution.drop_array_moa[i],
                    solution.windage_array_moa[i],
                    solution.time_array_sec[i],
                    solution.velocity_array_fps[i]
                );
            }
        }
        other => print_unexpected(other),
    }
}

fn print_environment(response: &Response, format: &str) {
    if format == "json" {
        print_json(response);
        return;
    }
    match &response.result {
        ResponseResult::Environment { reading, link } => {
            println!("{}", "🌡️  Latest Reading".bright_green().bold());
            println!(
                "  {:.1} mph @ {:.0}°, {:.1} °F, {:.2} inHg",
                reading.wind_speed_mph,
                reading.wind_direction_deg,
                reading.temperature_f,
                reading.pressure_inhg
            );
            if reading.timestamp_ms == 0 {
                println!("  {}", "no telemetry received yet (defaults)".dimmed());
            } else {
                println!("  updated at {} ms", reading.timestamp_ms);
            }
            print_link(link);
        }
        other => print_unexpected(other),
    }
}

fn print_messages(response: &Response, format: &str) {
    if format == "json" {
        print_json(response);
        return;
    }
    match &response.result {
        ResponseResult::Messages { messages } => {
            if messages.is_empty() {
                println!("{}", "No buffered messages.".dimmed());
                return;
            }
            println!(
                "{} {} message(s)",
                "📬".normal(),
                messages.len().to_string().bright_white()
            );
            for message in messages {
                match message {
                    TelemetryMessage::Environment(report) => {
                        let direction = report
                            .wind_direction_deg
                            .map_or_else(|| "-".to_string(), |d| format!("{:.0}°", d));
                        println!(
                            "  {} {:<12} {:.1} mph @ {}",
                            "🌬️".normal(),
                            report.sender.bright_cyan(),
                            report.wind_speed_mph,
                            direction
                        );
                    }
                    TelemetryMessage::Alert { sender, text } => {
                        println!(
                            "  {} {:<12} {}",
                            "⚠️".yellow(),
                            sender.bright_cyan(),
                            text.bright_yellow()
                        );
                    }
                    TelemetryMessage::Raw { text } => {
                        println!("  {} {}", "·".dimmed(), text.dimmed());
                    }
                }
            }
        }
        other => print_unexpected(other),
    }
}

fn print_status(response: &Response, format: &str) {
    if format == "json" {
        print_json(response);
        return;
    }
    match &response.result {
        ResponseResult::Status(status) => {
            println!("{}", "📊 Windscope Status".bright_green().bold());
            println!(
                "  {:<12} {}",
                "Simulator:".bright_white(),
                status.simulator.bright_cyan()
            );
            println!(
                "  {:<12} {:.0}-{:.0} yd, zero {:.0} yd, {} points default",
                "Solver:".bright_white(),
                status.settings.min_range_yds,
                status.settings.max_range_yds,
                status.settings.zero_range_yds,
                status.settings.default_sample_points
            );
            println!(
                "  {:<12} {} hits, {} misses, {} evictions, {} resident",
                "Cache:".bright_white(),
                status.cache.hits.to_string().bright_green(),
                status.cache.misses.to_string().bright_yellow(),
                status.cache.evictions,
                status.cache.entries
            );
            println!(
                "  {:<12} {} recorded, {} dropped, {} environment updates",
                "Store:".bright_white(),
                status.store.messages_recorded,
                status.store.messages_dropped,
                status.store.environment_updates
            );
            print_link(&status.link);
        }
        other => print_unexpected(other),
    }
}

fn print_link(link: &LinkReport) {
    let state = match link.state {
        LinkState::Connected => "connected".bright_green(),
        LinkState::Searching => "searching".bright_yellow(),
        LinkState::Stopped => "stopped".bright_red(),
    };
    let device = link.device_path.as_deref().unwrap_or("-");
    println!(
        "  {:<12} {} on {}, {} lines, {} oversize, {} connects",
        "Link:".bright_white(),
        state,
        device.bright_white(),
        link.lines_decoded,
        link.oversize_lines,
        link.connects
    );
}

fn print_json(response: &Response) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{} Failed to render response: {}", "❌".red(), e),
    }
}

fn print_unexpected(result: &ResponseResult) {
    if let ResponseResult::Error { kind, detail } = result {
        eprintln!(
            "{} {:?}: {}",
            "❌".red(),
            kind,
            detail.bright_red()
        );
    } else {
        eprintln!("{} Unexpected response: {:?}", "❌".red(), result);
    }
}
