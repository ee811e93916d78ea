use chirplink_core::Licence;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const KEY: &str = "cli-test-key";
const SECRET: &str = "cli-test-secret";

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_chirplink"))
}

/// Fresh scratch directory per test, holding an offline licence file
fn scratch_dir(name: &str, protocol: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("chirplink-cli-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    let token = Licence::issue(KEY, protocol).to_token().expect("Failed to issue licence");
    fs::write(dir.join("licence.txt"), token).expect("Failed to write licence");
    dir
}

fn run_chirplink(dir: &Path, args: &[&str]) -> Output {
    Command::new(binary())
        .current_dir(dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute chirplink")
}

fn session_args<'a>(command: &'a str) -> Vec<&'a str> {
    vec![command, KEY, SECRET, "--licence-file", "licence.txt", "--no-telemetry"]
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn all_output(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout)
}

#[test]
fn test_write_then_read_hex_payload() {
    let dir = scratch_dir("write-read", "standard");

    let mut args = session_args("write");
    args.extend(["-H", "0102030405", "-o", "chirp.wav"]);
    let output = run_chirplink(&dir, &args);
    assert!(output.status.success(), "write failed: {}", all_output(&output));
    assert!(stdout(&output).contains("Wrote audio to output: chirp.wav"));

    let reader = hound::WavReader::open(dir.join("chirp.wav")).expect("Output is not a WAV file");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_rate, 44100);
    assert!(reader.len() > 44100 / 2, "Chirp too short: {} samples", reader.len());

    let mut args = session_args("read");
    args.push("chirp.wav");
    let output = run_chirplink(&dir, &args);
    assert!(output.status.success(), "read failed: {}", all_output(&output));
    assert!(
        stdout(&output).contains("Received: 0102030405"),
        "Expected decoded payload but got: {}",
        all_output(&output)
    );
}

#[test]
fn test_write_uses_payload_hex_as_default_filename() {
    let dir = scratch_dir("default-name", "compact");

    let mut args = session_args("write");
    args.extend(["-A", "hello"]);
    let output = run_chirplink(&dir, &args);

    assert!(output.status.success(), "write failed: {}", all_output(&output));
    assert!(dir.join("68656c6c6f.wav").exists(), "Default output file was not created");
}

#[test]
fn test_loopback_receives_its_own_payload() {
    let dir = scratch_dir("loopback", "standard");

    let mut args = session_args("loopback");
    args.extend(["-A", "ping"]);
    let output = run_chirplink(&dir, &args);
    let text = stdout(&output);

    assert!(output.status.success(), "loopback failed: {}", all_output(&output));
    assert!(text.contains("Sending: 70696e67"));
    assert!(text.contains("Receiving data"));
    assert!(text.contains("Received: 70696e67"));
    assert!(text.contains("Loopback OK"));
}

#[test]
fn test_read_silence_finds_nothing() {
    let dir = scratch_dir("silence", "standard");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join("silence.wav"), spec).unwrap();
    for _ in 0..44100 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut args = session_args("read");
    args.push("silence.wav");
    let output = run_chirplink(&dir, &args);

    assert!(output.status.success(), "read failed: {}", all_output(&output));
    assert!(stdout(&output).contains("No chirps found"));
}

#[test]
fn test_invalid_licence_file_fails() {
    let dir = scratch_dir("bad-licence", "standard");
    fs::write(dir.join("licence.txt"), "definitely not a licence").unwrap();

    let mut args = session_args("write");
    args.extend(["-A", "x"]);
    let output = run_chirplink(&dir, &args);

    assert!(!output.status.success());
    assert!(all_output(&output).contains("Invalid licence"), "got: {}", all_output(&output));
}

#[test]
fn test_oversized_payload_is_rejected() {
    let dir = scratch_dir("oversized", "compact");

    let mut args = session_args("write");
    args.extend(["-A", "this is longer than eight bytes"]);
    let output = run_chirplink(&dir, &args);

    assert!(!output.status.success());
    assert!(all_output(&output).contains("exceeds the protocol maximum of 8"));
}
