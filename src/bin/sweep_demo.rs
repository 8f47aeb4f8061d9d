//! Sweep demo - animate a pair of head antennas against the in-memory gateway.
//!
//! Drop-in smoke test for the trajectory stack that needs no hardware: builds
//! two antenna motors on a [`FakeGateway`] and sweeps them back and forth,
//! printing the positions each half-cycle.
//!
//! Usage:
//!   sweep-demo [OPTIONS]
//!
//! Options:
//!   --amplitude <deg>    Sweep amplitude in degrees (default: 30)
//!   --duration <s>       Seconds per half-sweep (default: 1.0)
//!   --mode <name>        Interpolation mode, linear or minjerk (default: minjerk)
//!   --cycles <n>         Number of full sweep cycles (default: 3)

use anyhow::Result;
use std::sync::Arc;

use servolink::{goto, FakeGateway, InterpolationMode, RobotConfig, Target, TrajectoryPlayer};

struct Args {
    amplitude: f64,
    duration: f64,
    mode: InterpolationMode,
    cycles: u32,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args {
        amplitude: 30.0,
        duration: 1.0,
        mode: InterpolationMode::MinJerk,
        cycles: 3,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--amplitude" if i + 1 < args.len() => {
                result.amplitude = args[i + 1].parse()?;
                i += 2;
            }
            "--duration" if i + 1 < args.len() => {
                result.duration = args[i + 1].parse()?;
                i += 2;
            }
            "--mode" if i + 1 < args.len() => {
                result.mode = args[i + 1].parse()?;
                i += 2;
            }
            "--cycles" if i + 1 < args.len() => {
                result.cycles = args[i + 1].parse()?;
                i += 2;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    Ok(result)
}

fn print_usage() {
    println!("Sweep demo - animate a pair of head antennas without hardware");
    println!();
    println!("Usage: sweep-demo [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --amplitude <deg>    Sweep amplitude in degrees (default: 30)");
    println!("  --duration <s>       Seconds per half-sweep (default: 1.0)");
    println!("  --mode <name>        linear or minjerk (default: minjerk)");
    println!("  --cycles <n>         Number of full sweep cycles (default: 3)");
}

const ROBOT_JSON: &str = r#"{
    "motors": [
        { "name": "head.l_antenna", "id": 30, "offset": 26.0, "orientation": "direct" },
        { "name": "head.r_antenna", "id": 31, "offset": -4.5, "orientation": "indirect" }
    ]
}"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let args = parse_args()?;

    let gateway = Arc::new(FakeGateway::new(&[30, 31]));
    let robot = RobotConfig::from_json_str(ROBOT_JSON)?.build(gateway)?;
    let left = robot.motor("head.l_antenna")?;
    let right = robot.motor("head.r_antenna")?;

    println!("Antenna sweep");
    println!("=============");
    println!("Amplitude: {} deg", args.amplitude);
    println!("Half-sweep: {} s, mode {:?}, {} cycles", args.duration, args.mode, args.cycles);
    println!();

    for cycle in 0..args.cycles {
        for end in [args.amplitude, -args.amplitude] {
            // Antennas mirror each other: one player, two targets.
            let player = TrajectoryPlayer::new(
                vec![
                    Target { motor: left.clone(), start: left.goal_position()?, end },
                    Target { motor: right.clone(), start: right.goal_position()?, end: -end },
                ],
                args.duration,
                args.mode,
            )?;
            player.play().wait().await;

            println!(
                "[{}] left={:7.2}  right={:7.2}  ({:.1} C)",
                cycle,
                left.present_position()?,
                right.present_position()?,
                left.temperature()?,
            );
        }
    }

    // Torque off before handing the (virtual) robot back.
    robot.set_compliant_all(true)?;
    let lone = goto(left, 0.0, args.duration, args.mode)?;
    lone.wait().await;
    println!();
    println!(
        "Compliant: goal write dropped, left antenna stays at {:.2} deg",
        left.present_position()?
    );

    Ok(())
}
