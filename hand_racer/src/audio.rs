//! MIDI engine sound on its own thread.
//!
//! The engine is a held note whose pitch follows the gear and whose pitch
//! bend follows revs within the gear; velocity follows the throttle.  Crash
//! and coin cues go out as percussion on channel 10.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use drive_core::race::{AudioCue, EngineAudio, EngineParams};
use drive_core::vehicle::{GEARS, KPH_PER_MPS};
use drive_core::DriveState;

const ENGINE_CHANNEL: u8 = 0;
const DRUM_CHANNEL:   u8 = 9;
/// Lowest engine note, gear 1 idle.
const ENGINE_BASE_NOTE: u8 = 33;
const SEMITONES_PER_GEAR: u8 = 2;
const BEND_CENTRE: u16 = 0x2000;
const BEND_MAX:    u16 = 0x3FFF;

// ════════════════════════════════════════════════════════════════════════════
// EngineCommand — sent to the audio thread
// ════════════════════════════════════════════════════════════════════════════

enum EngineCommand {
    Update(EngineParams),
    Cue(AudioCue),
    /// Release the engine note; the thread keeps running.
    Silence,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — abstraction over midir / null
// ════════════════════════════════════════════════════════════════════════════

trait MidiOut: Send {
    fn send(&mut self, bytes: &[u8]);

    fn program_change(&mut self, channel: u8, program: u8) {
        self.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }
    fn pitch_bend(&mut self, channel: u8, value: u16) {
        let v = value.min(BEND_MAX);
        self.send(&[0xE0 | (channel & 0x0F), (v & 0x7F) as u8, (v >> 7) as u8]);
    }
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn send(&mut self, bytes: &[u8]) {
        let _ = self.conn.send(bytes);
    }
}

/// Used when no MIDI port is available.
struct NullOut;

impl MidiOut for NullOut {
    fn send(&mut self, _bytes: &[u8]) {}
}

/// Open the first software synth found, else the first port, else [`NullOut`].
fn open_midi_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("hand_racer_engine") {
        Ok(m)  => m,
        Err(e) => {
            warn!("MIDI init failed ({}), engine sound disabled", e);
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports, engine sound disabled (try `timidity -iA` or `fluidsynth`)");
        return Box::new(NullOut);
    }

    let port_idx = ports.iter()
        .position(|p| {
            midi_out.port_name(p).map(|n| {
                let n = n.to_lowercase();
                n.contains("fluid") || n.contains("timidity") || n.contains("synth") || n.contains("microsoft")
            }).unwrap_or(false)
        })
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out.port_name(port).unwrap_or_else(|_| "unknown".to_string());
    match midi_out.connect(port, "hand-racer-engine") {
        Ok(conn) => {
            info!("engine sound on MIDI port {}", name);
            Box::new(MidirOut { conn })
        }
        Err(e) => {
            warn!("cannot connect to MIDI port {} ({}), engine sound disabled", name, e);
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Engine mapping
// ════════════════════════════════════════════════════════════════════════════

/// Engine note for a gear (1-based).
fn engine_note(gear: u8) -> u8 {
    ENGINE_BASE_NOTE + gear.saturating_sub(1) * SEMITONES_PER_GEAR
}

/// How far through its gear band the car is, 0 at the bottom, 1 at the top.
/// The open-ended top gear is measured against the car's top speed.
fn rev_fraction(kph: f32, gear: u8, max_kph: f32) -> f32 {
    let i = (gear.max(1) as usize - 1).min(GEARS.len() - 1);
    let lo = if i == 0 { 0.0 } else { GEARS[i - 1].top_kph };
    let hi = if GEARS[i].top_kph.is_finite() { GEARS[i].top_kph } else { max_kph.max(lo + 1.0) };
    ((kph - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Pitch-bend value for a rev fraction; the engine only ever bends up.
fn bend_for(revs: f32) -> u16 {
    BEND_CENTRE + (revs.clamp(0.0, 1.0) * (BEND_MAX - BEND_CENTRE) as f32) as u16
}

fn velocity_for(drive: DriveState) -> u8 {
    match drive {
        DriveState::Gas     => 110,
        DriveState::Neutral => 75,
        DriveState::Brake   => 55,
    }
}

/// GM percussion key for a cue.
fn cue_note(cue: AudioCue) -> u8 {
    match cue {
        AudioCue::Crash    => 49, // crash cymbal
        AudioCue::Coin     => 81, // open triangle
        AudioCue::LevelUp  => 56, // cowbell
        AudioCue::GameOver => 57, // crash cymbal 2
    }
}

// ════════════════════════════════════════════════════════════════════════════
// EngineSound — handle to the audio thread
// ════════════════════════════════════════════════════════════════════════════

pub struct EngineSound {
    cmd_tx: Sender<EngineCommand>,
}

impl EngineSound {
    /// Spawn the audio thread.  `instrument` is the GM program for the engine.
    pub fn spawn(instrument: u8) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();
        thread::spawn(move || engine_thread(open_midi_output(), instrument, cmd_rx));
        EngineSound { cmd_tx }
    }

    /// Engine thread writing to nowhere, for tests and `--mute`.
    pub fn muted() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();
        thread::spawn(move || engine_thread(Box::new(NullOut), 0, cmd_rx));
        EngineSound { cmd_tx }
    }

    pub fn quit(&self) { let _ = self.cmd_tx.send(EngineCommand::Quit); }
}

impl EngineAudio for EngineSound {
    fn update(&mut self, params: &EngineParams) {
        let _ = self.cmd_tx.send(EngineCommand::Update(*params));
    }

    fn cue(&mut self, cue: AudioCue) {
        let _ = self.cmd_tx.send(EngineCommand::Cue(cue));
    }

    fn stop(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Silence);
    }
}

impl Drop for EngineSound {
    fn drop(&mut self) { self.quit(); }
}

// ════════════════════════════════════════════════════════════════════════════
// engine_thread — the actual loop
// ════════════════════════════════════════════════════════════════════════════

/// Currently sounding engine note.
#[derive(Clone, Copy, PartialEq)]
struct Voice {
    note:     u8,
    velocity: u8,
}

fn engine_thread(mut midi: Box<dyn MidiOut>, instrument: u8, cmd_rx: Receiver<EngineCommand>) {
    midi.program_change(ENGINE_CHANNEL, instrument);
    let mut voice: Option<Voice> = None;
    let mut last_bend = BEND_CENTRE;

    // Block for the first command, then coalesce whatever queued up behind
    // it so only the latest engine state is played.
    while let Ok(first) = cmd_rx.recv() {
        let mut latest: Option<EngineParams> = None;
        let mut pending = Some(first);
        while let Some(cmd) = pending.take().or_else(|| cmd_rx.try_recv().ok()) {
            match cmd {
                EngineCommand::Update(p) => latest = Some(p),
                EngineCommand::Cue(c) => {
                    let n = cue_note(c);
                    midi.note_on(DRUM_CHANNEL, n, 120);
                    midi.note_off(DRUM_CHANNEL, n);
                }
                EngineCommand::Silence => {
                    latest = None;
                    if let Some(v) = voice.take() { midi.note_off(ENGINE_CHANNEL, v.note); }
                    midi.pitch_bend(ENGINE_CHANNEL, BEND_CENTRE);
                    last_bend = BEND_CENTRE;
                }
                EngineCommand::Quit => {
                    if let Some(v) = voice.take() { midi.note_off(ENGINE_CHANNEL, v.note); }
                    return;
                }
            }
        }

        let Some(p) = latest else { continue };
        let want = Voice { note: engine_note(p.gear), velocity: velocity_for(p.drive_state) };
        if voice != Some(want) {
            if let Some(v) = voice { midi.note_off(ENGINE_CHANNEL, v.note); }
            midi.note_on(ENGINE_CHANNEL, want.note, want.velocity);
            voice = Some(want);
        }
        let bend = bend_for(rev_fraction(p.kph, p.gear, p.max_speed * KPH_PER_MPS));
        if bend.abs_diff(last_bend) > 64 {
            midi.pitch_bend(ENGINE_CHANNEL, bend);
            last_bend = bend;
        }
        // the window runs at ~60 Hz; no point sending faster
        thread::sleep(Duration::from_millis(8));
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<Vec<u8>>>>);

    impl MidiOut for Capture {
        fn send(&mut self, bytes: &[u8]) {
            self.0.lock().unwrap().push(bytes.to_vec());
        }
    }

    fn params(kph: f32, drive: DriveState) -> EngineParams {
        EngineParams {
            speed: kph / KPH_PER_MPS,
            max_speed: 55.0,
            kph,
            gear: drive_core::vehicle::gear_for_kph(kph),
            drive_state: drive,
        }
    }

    #[test]
    fn higher_gear_higher_note() {
        assert!(engine_note(1) < engine_note(2));
        assert_eq!(engine_note(6), ENGINE_BASE_NOTE + 10);
    }

    #[test]
    fn revs_span_the_band() {
        assert_eq!(rev_fraction(0.0, 1, 198.0), 0.0);
        assert!((rev_fraction(52.5, 2, 198.0) - 0.5).abs() < 1e-4);
        assert_eq!(rev_fraction(500.0, 6, 198.0), 1.0);
    }

    #[test]
    fn bend_stays_in_range() {
        assert_eq!(bend_for(0.0), BEND_CENTRE);
        assert!(bend_for(1.0) <= BEND_MAX);
        assert!(bend_for(0.5) > BEND_CENTRE);
    }

    #[test]
    fn pitch_bend_is_two_seven_bit_bytes() {
        let cap = Capture::default();
        let mut out = cap.clone();
        out.pitch_bend(0, BEND_MAX);
        assert_eq!(cap.0.lock().unwrap()[0], vec![0xE0, 0x7F, 0x7F]);
    }

    #[test]
    fn thread_plays_engine_and_cues() {
        let cap = Capture::default();
        let (tx, rx) = mpsc::channel();
        let out = cap.clone();
        let handle = thread::spawn(move || engine_thread(Box::new(out), 30, rx));

        tx.send(EngineCommand::Update(params(80.0, DriveState::Gas))).unwrap();
        tx.send(EngineCommand::Cue(AudioCue::Coin)).unwrap();
        tx.send(EngineCommand::Silence).unwrap();
        tx.send(EngineCommand::Quit).unwrap();
        handle.join().unwrap();

        let sent = cap.0.lock().unwrap();
        assert_eq!(sent[0], vec![0xC0, 30]);
        assert!(sent.iter().any(|m| m == &vec![0x99, 81, 120]));
        // whatever was held has been released
        let ons  = sent.iter().filter(|m| m[0] == 0x90).count();
        let offs = sent.iter().filter(|m| m[0] == 0x80).count();
        assert_eq!(ons, offs);
    }

    #[test]
    fn muted_engine_accepts_everything() {
        let mut e = EngineSound::muted();
        e.update(&params(120.0, DriveState::Neutral));
        e.cue(AudioCue::Crash);
        e.stop();
    }
}
