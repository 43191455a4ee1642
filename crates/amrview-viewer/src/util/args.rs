use amrview_core::Zone;
use anyhow::Result;
use std::ffi::OsString;
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: amrview [--config PATH] [--username NAME] <command>

commands:
  import <archive> [--area ID]          decode a map/security container and store it
  show                                  summarize the stored map and security config
  locate <query> [--zoom Z]             find a marker on the stored map
  click <x> <y> [--zoom Z]              click the stored map at a screen position
  watch [--group ID]...                 follow telemetry and monitor channels
  dispatch --zone supply|demand --cell N
  dispatch-paired --supply N --demand N
  grid-config [--supply N] [--demand N] show, or update and save, the grid config";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Import { archive: PathBuf, area: Option<i64> },
    Show,
    Locate { query: String, zoom: Option<f64> },
    Click { screen: [f64; 2], zoom: Option<f64> },
    Watch { groups: Vec<String> },
    Dispatch { zone: Zone, cell: u32 },
    DispatchPaired { supply: u32, demand: u32 },
    GridConfig { supply: Option<u32>, demand: Option<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub username: Option<String>,
    pub command: Command,
}

pub fn parse_args() -> Result<Args> {
    parse_args_from(std::env::args_os().skip(1))
}

fn value<I: Iterator<Item = OsString>>(args: &mut I, flag: &str, what: &str) -> Result<String> {
    let Some(v) = args.next() else {
        anyhow::bail!("{flag} expects {what}");
    };
    Ok(v.to_string_lossy().into_owned())
}

fn number<T: std::str::FromStr, I: Iterator<Item = OsString>>(args: &mut I, flag: &str) -> Result<T> {
    let raw = value(args, flag, "a number")?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{flag} expects a number, got {raw:?}"))
}

pub fn parse_args_from<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut config = None;
    let mut username = None;

    let command = loop {
        let Some(arg) = args.next() else {
            anyhow::bail!("missing command\n{USAGE}");
        };
        let arg = arg.to_string_lossy().into_owned();
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value(&mut args, "--config", "a path")?)),
            "--username" => username = Some(value(&mut args, "--username", "a name")?),
            _ => break arg,
        }
    };

    let command = match command.as_str() {
        "import" => {
            let mut archive = None;
            let mut area = None;
            while let Some(arg) = args.next() {
                if arg == "--area" {
                    area = Some(number(&mut args, "--area")?);
                } else if archive.is_none() {
                    archive = Some(PathBuf::from(arg));
                } else {
                    anyhow::bail!("unexpected argument: {:?}", arg);
                }
            }
            let Some(archive) = archive else {
                anyhow::bail!("import expects an archive path");
            };
            Command::Import { archive, area }
        }
        "locate" => {
            let mut query = None;
            let mut zoom = None;
            while let Some(arg) = args.next() {
                if arg == "--zoom" {
                    zoom = Some(number(&mut args, "--zoom")?);
                } else if query.is_none() {
                    query = Some(arg.to_string_lossy().into_owned());
                } else {
                    anyhow::bail!("unexpected argument: {:?}", arg);
                }
            }
            let Some(query) = query else {
                anyhow::bail!("locate expects a query");
            };
            Command::Locate { query, zoom }
        }
        "show" => {
            if let Some(arg) = args.next() {
                anyhow::bail!("unexpected argument: {:?}", arg);
            }
            Command::Show
        }
        "click" => {
            let mut coords = Vec::with_capacity(2);
            let mut zoom = None;
            while let Some(arg) = args.next() {
                if arg == "--zoom" {
                    zoom = Some(number(&mut args, "--zoom")?);
                } else if coords.len() < 2 {
                    let raw = arg.to_string_lossy();
                    let Ok(v) = raw.parse::<f64>() else {
                        anyhow::bail!("click expects pixel coordinates, got {raw:?}");
                    };
                    coords.push(v);
                } else {
                    anyhow::bail!("unexpected argument: {:?}", arg);
                }
            }
            let [x, y] = coords[..] else {
                anyhow::bail!("click expects <x> <y>");
            };
            Command::Click {
                screen: [x, y],
                zoom,
            }
        }
        "watch" => {
            let mut groups = Vec::new();
            while let Some(arg) = args.next() {
                if arg == "--group" {
                    groups.push(value(&mut args, "--group", "a group id")?);
                } else {
                    anyhow::bail!("unknown argument: {:?}", arg);
                }
            }
            Command::Watch { groups }
        }
        "dispatch" => {
            let mut zone = None;
            let mut cell = None;
            while let Some(arg) = args.next() {
                if arg == "--zone" {
                    let raw = value(&mut args, "--zone", "supply|demand")?;
                    let Some(z) = Zone::parse(&raw) else {
                        anyhow::bail!("invalid zone: {raw} (expected supply|demand)");
                    };
                    zone = Some(z);
                } else if arg == "--cell" {
                    cell = Some(number(&mut args, "--cell")?);
                } else {
                    anyhow::bail!("unknown argument: {:?}", arg);
                }
            }
            match (zone, cell) {
                (Some(zone), Some(cell)) => Command::Dispatch { zone, cell },
                _ => anyhow::bail!("dispatch expects --zone and --cell"),
            }
        }
        "dispatch-paired" => {
            let mut supply = None;
            let mut demand = None;
            while let Some(arg) = args.next() {
                if arg == "--supply" {
                    supply = Some(number(&mut args, "--supply")?);
                } else if arg == "--demand" {
                    demand = Some(number(&mut args, "--demand")?);
                } else {
                    anyhow::bail!("unknown argument: {:?}", arg);
                }
            }
            match (supply, demand) {
                (Some(supply), Some(demand)) => Command::DispatchPaired { supply, demand },
                _ => anyhow::bail!("dispatch-paired expects --supply and --demand"),
            }
        }
        "grid-config" => {
            let mut supply = None;
            let mut demand = None;
            while let Some(arg) = args.next() {
                if arg == "--supply" {
                    supply = Some(number(&mut args, "--supply")?);
                } else if arg == "--demand" {
                    demand = Some(number(&mut args, "--demand")?);
                } else {
                    anyhow::bail!("unknown argument: {:?}", arg);
                }
            }
            Command::GridConfig { supply, demand }
        }
        other => anyhow::bail!("unknown command: {other}\n{USAGE}"),
    };

    Ok(Args {
        config,
        username,
        command,
    })
}
