mod api;
mod audio;
mod protocol;
mod session;

use crate::api::ApiClient;
use crate::audio::{AudioRecorder, Take};
use crate::protocol::FALLBACK_SENTENCE;
use crate::session::{REQUIRED_TAKES, RecordedTake, Session, View};
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use jiff::Zoned;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "voicegate")]
#[command(about = "CLI voice enrollment and verification client")]
#[command(version = "0.1.0")]
struct Cli {
    /// Base URL of the voice-biometric server
    #[arg(long, global = true, default_value = "http://localhost:5000")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the full sentence batch and enroll a voice profile
    Enroll {
        /// User ID to enroll
        #[arg(long)]
        user_id: String,

        /// Recording window per sentence in seconds
        #[arg(long, default_value = "5")]
        duration: u64,

        /// Audio sample rate in Hz
        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        /// Keep each take as a WAV file in the data directory
        #[arg(long)]
        keep_recordings: bool,
    },

    /// Record one prompted take and validate it against an enrolled profile
    Validate {
        /// User ID to validate
        #[arg(long)]
        user_id: String,

        /// Recording window in seconds
        #[arg(long, default_value = "5")]
        duration: u64,

        /// Audio sample rate in Hz
        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        /// Keep the take as a WAV file in the data directory
        #[arg(long)]
        keep_recordings: bool,
    },

    /// Free-speech verification: record up to the maximum, Enter stops early
    Verify {
        /// User ID to verify
        #[arg(long)]
        user_id: String,

        /// Maximum recording duration in seconds
        #[arg(long, default_value = "30")]
        max_duration: u64,

        /// Audio sample rate in Hz
        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        /// Keep the take as a WAV file in the data directory
        #[arg(long)]
        keep_recordings: bool,
    },

    /// Fetch and print the enrollment prompt list
    Sentences,

    /// List available audio recording devices
    Devices,
}

pub fn get_recordings_dir() -> Result<PathBuf> {
    let data_dir = directories::BaseDirs::new()
        .ok_or_else(|| anyhow!("Could not find data directory"))?
        .data_local_dir()
        .join("voicegate")
        .join("recordings");

    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

fn take_path(user_id: &str, label: &str) -> Result<PathBuf> {
    let recordings_dir = get_recordings_dir()?;
    let timestamp = Zoned::now().strftime("%Y-%m-%d_%H-%M-%S");
    Ok(recordings_dir.join(format!("{}_{}_{}.wav", timestamp, user_id, label)))
}

fn wait_for_enter(prompt: &str) -> Result<()> {
    print!("{} ", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(())
}

/// Raise `stop` when the user presses Enter
///
/// The thread stays parked on stdin if the take ends on its own; it holds no
/// resources beyond the flag and exits with the process.
fn spawn_enter_watcher(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        stop.store(true, Ordering::Release);
    });
}

/// Record one take while rendering a 1-second countdown bar
fn record_with_countdown(
    recorder: &AudioRecorder,
    duration: Duration,
    stop: Option<Arc<AtomicBool>>,
) -> Result<Take> {
    let stop = stop.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    let total = duration.as_secs();

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.red} recording [{bar:30.red/white}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .progress_chars("#>-"),
    );

    let take = recorder.record_take(duration, stop, |remaining| {
        pb.set_position(total.saturating_sub(remaining));
        pb.set_message(format!("{}s left", remaining));
    })?;

    pb.finish_with_message("done");
    Ok(take)
}

async fn run_enroll(
    api: &ApiClient,
    user_id: &str,
    duration: u64,
    sample_rate: u32,
    keep_recordings: bool,
) -> Result<()> {
    let sentences = api
        .get_sentences()
        .await
        .map_err(|e| anyhow!("Failed to fetch sentences: {}", e))?;

    if sentences.is_empty() {
        return Err(anyhow!("The server returned no enrollment sentences"));
    }

    // Batch size follows the server's list so client and server agree on count
    let mut session = Session::new(View::Enroll, user_id, sentences.len());
    let recorder = AudioRecorder::new(sample_rate)
        .map_err(|e| anyhow!("Error accessing microphone: {}", e))?;

    println!(
        "Voice enrollment for '{}': {} sentences, {}s per take",
        user_id,
        sentences.len(),
        duration
    );

    let mut index = 0;
    while index < sentences.len() {
        let sentence = &sentences[index];
        println!();
        println!("Sentence {}/{}:", index + 1, sentences.len());
        println!("  \"{}\"", sentence);
        wait_for_enter("Press Enter to start recording...")?;

        match record_with_countdown(&recorder, Duration::from_secs(duration), None) {
            Ok(take) if !take.is_empty() => {
                if keep_recordings {
                    let path = take_path(user_id, &format!("enroll_{:02}", index))?;
                    take.save(&path)?;
                    println!("Saved {}", path.display());
                }

                let wav = take.to_wav_bytes()?;
                session.stage_take(RecordedTake {
                    sentence: sentence.clone(),
                    wav,
                })?;
                session.set_message(format!("Sentence {} recorded", index + 1));
                println!("{}", session.message());
                index += 1;
            }
            Ok(_) => {
                println!("No audio captured; recording this sentence again.");
            }
            Err(e) => {
                println!("Recording failed: {}. Recording this sentence again.", e);
            }
        }
    }

    // Precondition gate: no network call unless the batch is complete
    if let Err(e) = session.check_enrollment() {
        session.set_message(e.to_string());
        println!("{}", session.message());
        return Ok(());
    }

    println!();
    println!("Uploading {} takes...", session.batch().len());

    match api.enroll(session.user_id(), session.batch().takes()).await {
        Ok(()) => {
            session.set_message("All voice recordings successfully enrolled!");
            println!("{}", session.message());
        }
        Err(e) => {
            session.set_message(e.to_string());
            eprintln!("{}", session.message());
        }
    }

    Ok(())
}

async fn run_validate(
    api: &ApiClient,
    user_id: &str,
    duration: u64,
    sample_rate: u32,
    keep_recordings: bool,
) -> Result<()> {
    let mut session = Session::new(View::Enroll, user_id, REQUIRED_TAKES);
    // Entering validation always starts from a fresh attempt
    session.select_view(View::Validate);

    let sentence = match api.get_sentence().await {
        Ok(sentence) => sentence,
        Err(e) => {
            eprintln!(
                "Failed to fetch a prompt ({}); using the fallback sentence.",
                e
            );
            FALLBACK_SENTENCE.to_string()
        }
    };

    println!("Please read aloud:");
    println!("  \"{}\"", sentence);
    wait_for_enter("Press Enter to start recording...")?;

    let recorder = AudioRecorder::new(sample_rate)
        .map_err(|e| anyhow!("Error accessing microphone: {}", e))?;
    let take = record_with_countdown(&recorder, Duration::from_secs(duration), None)?;

    if keep_recordings && !take.is_empty() {
        let path = take_path(user_id, "validate")?;
        take.save(&path)?;
        println!("Saved {}", path.display());
    }

    if !take.is_empty() {
        session.stage_validation(Some(sentence.clone()), take.to_wav_bytes()?);
    }

    if let Err(e) = session.check_validation() {
        session.set_message(e.to_string());
        println!("{}", session.message());
        return Ok(());
    }

    let wav = match session.attempt().wav.clone() {
        Some(wav) => wav,
        None => return Ok(()),
    };

    println!("Validating...");

    match api.validate_trial(session.user_id(), &sentence, wav).await {
        Ok(verified) => {
            session.record_outcome(verified);
            session.set_message(if verified {
                "Voice authentication successful!"
            } else {
                "Voice authentication failed!"
            });
            println!("{}", session.message());
        }
        Err(e) => {
            session.set_message(e.to_string());
            eprintln!("{}", session.message());
        }
    }

    Ok(())
}

async fn run_verify(
    api: &ApiClient,
    user_id: &str,
    max_duration: u64,
    sample_rate: u32,
    keep_recordings: bool,
) -> Result<()> {
    let mut session = Session::new(View::Enroll, user_id, REQUIRED_TAKES);
    session.select_view(View::Validate);

    println!(
        "Speak freely for up to {}s; press Enter to stop early.",
        max_duration
    );
    wait_for_enter("Press Enter to start recording...")?;

    let recorder = AudioRecorder::new(sample_rate)
        .map_err(|e| anyhow!("Error accessing microphone: {}", e))?;

    let stop = Arc::new(AtomicBool::new(false));
    spawn_enter_watcher(stop.clone());

    let take = record_with_countdown(&recorder, Duration::from_secs(max_duration), Some(stop))?;
    println!("Recording complete ({:.1}s)", take.duration().as_secs_f32());

    if keep_recordings && !take.is_empty() {
        let path = take_path(user_id, "verify")?;
        take.save(&path)?;
        println!("Saved {}", path.display());
    }

    if !take.is_empty() {
        session.stage_validation(None, take.to_wav_bytes()?);
    }

    if let Err(e) = session.check_validation() {
        session.set_message(e.to_string());
        println!("{}", session.message());
        return Ok(());
    }

    let wav = match session.attempt().wav.clone() {
        Some(wav) => wav,
        None => return Ok(()),
    };

    println!("Verifying...");

    match api.verify(session.user_id(), wav).await {
        Ok(message) => {
            session.record_outcome(true);
            session.set_message(message);
            println!("{}", session.message());
        }
        Err(e) => {
            session.set_message(e.to_string());
            eprintln!("{}", session.message());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.server_url);

    match cli.command {
        Commands::Enroll {
            user_id,
            duration,
            sample_rate,
            keep_recordings,
        } => {
            if let Err(e) = run_enroll(&api, &user_id, duration, sample_rate, keep_recordings).await
            {
                eprintln!("Enrollment failed: {}", e);
            }
        }

        Commands::Validate {
            user_id,
            duration,
            sample_rate,
            keep_recordings,
        } => {
            if let Err(e) =
                run_validate(&api, &user_id, duration, sample_rate, keep_recordings).await
            {
                eprintln!("Validation failed: {}", e);
            }
        }

        Commands::Verify {
            user_id,
            max_duration,
            sample_rate,
            keep_recordings,
        } => {
            if let Err(e) =
                run_verify(&api, &user_id, max_duration, sample_rate, keep_recordings).await
            {
                eprintln!("Verification failed: {}", e);
            }
        }

        Commands::Sentences => match api.get_sentences().await {
            Ok(sentences) => {
                println!("Enrollment sentences ({}):", sentences.len());
                for (index, sentence) in sentences.iter().enumerate() {
                    println!("{:>3}. {}", index + 1, sentence);
                }
            }
            Err(e) => {
                eprintln!("Failed to fetch sentences: {}", e);
            }
        },

        Commands::Devices => match AudioRecorder::list_devices() {
            Ok(devices) => {
                println!("Available Audio Devices:");
                println!(
                    "{:<30} {:<10} {:<20} Formats",
                    "Name", "Default", "Sample Rates"
                );
                println!("{}", "-".repeat(80));

                for device in devices {
                    let default_str = if device.is_default { "YES" } else { "NO" };
                    let sample_rates = device
                        .supported_sample_rates
                        .iter()
                        .take(3)
                        .map(|sr| sr.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");

                    let formats = device
                        .supported_formats
                        .iter()
                        .take(2)
                        .map(|f| format!("{:?}", f))
                        .collect::<Vec<_>>()
                        .join(", ");

                    println!(
                        "{:<30} {:<10} {:<20} {}",
                        &device.name[..device.name.len().min(30)],
                        default_str,
                        sample_rates,
                        formats
                    );
                }
            }
            Err(e) => {
                eprintln!("Failed to list audio devices: {}", e);
            }
        },
    }
}
