//! Shotrial Admin - interactive arbitration console
//!
//! Connects to a running node and works the dispute queue: list open
//! disputes, rule an authoritative count, or discard a rule-violating
//! video.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use anyhow::{bail, Context};

use shotrial::arbitration::AdminRuling;
use shotrial::service::{Request, Response};
use shotrial::types::{UserId, VideoId};

fn main() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7420".to_string());

    println!("Shotrial Admin v{}", shotrial::VERSION);
    println!("Connecting to {addr}...");

    let stream = TcpStream::connect(&addr).with_context(|| format!("connect to {addr}"))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    println!("Connected.");
    println!();
    println!("Commands:");
    println!("  list                 - Open disputes, oldest first");
    println!("  count <video> <n>    - Rule an authoritative shot count");
    println!("  discard <video>      - Discard a rule-violating video");
    println!("  user <id>            - Show a user record");
    println!("  video <id>           - Show a video record");
    println!("  help                 - Show this help");
    println!("  quit                 - Exit");
    println!();

    loop {
        print!("shotrial> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let result = match parts[0] {
            "list" => send(&mut writer, &mut reader, &Request::ListDisputes),
            "count" if parts.len() == 3 => arbitrate_count(&mut writer, &mut reader, &parts),
            "discard" if parts.len() == 2 => {
                parse_video(parts[1]).and_then(|video_id| {
                    send(
                        &mut writer,
                        &mut reader,
                        &Request::Arbitrate {
                            video_id,
                            ruling: AdminRuling::Discard,
                        },
                    )
                })
            }
            "user" if parts.len() == 2 => send(
                &mut writer,
                &mut reader,
                &Request::GetUser {
                    user_id: UserId::new(parts[1]),
                },
            ),
            "video" if parts.len() == 2 => parse_video(parts[1]).and_then(|video_id| {
                send(&mut writer, &mut reader, &Request::GetVideo { video_id })
            }),
            "help" => {
                println!("list | count <video> <n> | discard <video> | user <id> | video <id> | quit");
                continue;
            }
            "quit" | "exit" => break,
            _ => {
                println!("unknown command (try 'help')");
                continue;
            }
        };

        match result {
            Ok(response) => print_response(&response),
            Err(e) => println!("error: {e}"),
        }
    }

    Ok(())
}

fn arbitrate_count(
    writer: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    parts: &[&str],
) -> anyhow::Result<Response> {
    let video_id = parse_video(parts[1])?;
    let shots: u32 = parts[2].parse().context("shot count must be a number")?;

    send(
        writer,
        reader,
        &Request::Arbitrate {
            video_id,
            ruling: AdminRuling::Count(shots),
        },
    )
}

fn parse_video(s: &str) -> anyhow::Result<VideoId> {
    match VideoId::from_hex(s) {
        Ok(id) => Ok(id),
        Err(e) => bail!("bad video id: {e}"),
    }
}

fn send(
    writer: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    request: &Request,
) -> anyhow::Result<Response> {
    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    writer.write_all(&payload)?;

    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.is_empty() {
        bail!("connection closed by node");
    }

    Ok(serde_json::from_str(&line)?)
}

fn print_response(response: &Response) {
    match response {
        Response::Disputes { disputes } => {
            if disputes.is_empty() {
                println!("no open disputes");
                return;
            }

            for d in disputes {
                let verdict = d
                    .reviewer_verdict
                    .count()
                    .map_or_else(|| "rule violation".to_string(), |n| n.to_string());
                println!(
                    "{}  [{}]  uploader {} says {}, reviewer {} says {}{}",
                    d.video_id,
                    d.country,
                    d.owner,
                    d.reported_shots,
                    d.reviewer,
                    verdict,
                    d.reason
                        .as_deref()
                        .map_or_else(String::new, |r| format!("  ({r})")),
                );
            }
        }
        Response::Arbitrated { fault, final_shots } => {
            match final_shots {
                Some(n) => println!("finalized at {n} shots, fault: {fault:?}"),
                None => println!("video discarded, fault: {fault:?}"),
            }
        }
        Response::User { record } => {
            println!("user {}  [{}]", record.id, record.country);
            println!("  has reviewed:      {}", record.has_reviewed);
            println!("  incorrect uploads: {}", record.incorrect_uploads);
            println!("  incorrect reviews: {}", record.incorrect_reviews);
            println!(
                "  last 100:          {:.1}% over {} sessions",
                record.stats.last100.percentage, record.stats.last100.sessions_counted
            );
            println!(
                "  all time:          {}/{} shots",
                record.stats.all_time.shots, record.stats.all_time.attempts
            );
        }
        Response::Video { video } => {
            println!("video {}", video.id);
            println!("  owner:   {}", video.owner);
            println!("  country: {}", video.country);
            println!("  status:  {:?}", video.status);
            println!(
                "  shots:   {}",
                video
                    .reported_shots
                    .map_or_else(|| "-".to_string(), |n| n.to_string())
            );
        }
        Response::Error { kind, message } => println!("rejected ({kind}): {message}"),
        other => println!("{other:?}"),
    }
}
