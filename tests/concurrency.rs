mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use common::{init_tracing, Constant};
use mischer::{AudioManager, MixerConfig, MixerError, SharedStream, Stream};

const THREADS: usize = 8;
const ADDS_PER_THREAD: usize = 50;

/// Keeps rendering until `stop` is raised; returns how many passes ran.
fn spawn_audio_thread(mixer: Arc<AudioManager>, stop: Arc<AtomicBool>) -> thread::JoinHandle<usize> {
    let renderer = mixer.renderer();
    thread::spawn(move || {
        let mut out = vec![0i16; 256 * 2];
        let mut passes = 0;
        while !stop.load(Ordering::Acquire) {
            renderer.render(&mut out, 2);
            passes += 1;
        }
        passes
    })
}

#[test]
fn concurrent_adds_during_mixing_are_all_kept() {
    init_tracing();
    let mixer = Arc::new(AudioManager::new(MixerConfig::default().with_sample_rate(48_000)));
    let stop = Arc::new(AtomicBool::new(false));
    let audio = spawn_audio_thread(mixer.clone(), stop.clone());

    let added = Arc::new(AtomicUsize::new(0));
    let callers: Vec<_> = (0..THREADS)
        .map(|_| {
            let mixer = mixer.clone();
            let added = added.clone();
            thread::spawn(move || {
                for _ in 0..ADDS_PER_THREAD {
                    if mixer.add_stream(Stream::new(Constant::new(1))).is_ok() {
                        added.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    stop.store(true, Ordering::Release);
    assert!(audio.join().unwrap() > 0);

    assert_eq!(added.load(Ordering::SeqCst), THREADS * ADDS_PER_THREAD);
    assert_eq!(mixer.stream_count(), THREADS * ADDS_PER_THREAD);

    let mut out = vec![0i16; 2];
    mixer.render(&mut out, 2);
    assert_eq!(out, vec![(THREADS * ADDS_PER_THREAD) as i16; 2]);
}

#[test]
fn racing_adds_of_one_stream_register_it_once() {
    init_tracing();
    let mixer = Arc::new(AudioManager::new(MixerConfig::default().with_sample_rate(48_000)));
    let shared: SharedStream = Stream::new(Constant::new(1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let mixer = mixer.clone();
            let stream = shared.clone();
            thread::spawn(move || mixer.add_stream(stream))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| *r == Err(MixerError::DuplicateStream)));
    assert_eq!(mixer.stream_count(), 1);
}

#[test]
fn volume_and_rate_changes_race_with_mixing() {
    init_tracing();
    let mixer = Arc::new(AudioManager::new(MixerConfig::default().with_sample_rate(48_000)));
    let source = Constant::new(10_000);
    let probe = source.probe();
    mixer.add_stream(Stream::new(source)).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let renderer = mixer.renderer();
    let observer = {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut out = vec![0i16; 64 * 2];
            while !stop.load(Ordering::Acquire) {
                renderer.render(&mut out, 2);
                // a pass sees one volume from start to end
                assert!(out.windows(2).all(|w| w[0] == w[1]), "torn volume: {:?}", &out[..4]);
                assert!(out[0] == 10_000 || out[0] == 5_000, "unexpected sample {}", out[0]);
            }
        })
    };

    for i in 0..200 {
        mixer.set_volume(if i % 2 == 0 { 0.5 } else { 1.0 });
        let rate = if i % 2 == 0 { 44_100 } else { 48_000 };
        mixer.set_sample_rate(rate).unwrap();
    }

    stop.store(true, Ordering::Release);
    observer.join().unwrap();
    assert_eq!(mixer.stream_count(), 1);
    assert_eq!(probe.rates().len(), 201);
}

#[test]
fn retiring_a_stream_its_owner_holds_does_not_block_mixing() {
    init_tracing();
    let mixer = Arc::new(AudioManager::new(MixerConfig::default().with_sample_rate(48_000)));
    let source = Constant::new(7);
    let probe = source.probe();
    let stream = Stream::new(source);
    mixer.add_stream(stream.clone()).unwrap();

    let guard = stream.lock();
    stream.mark_finished(true);

    let (done_tx, done_rx) = mpsc::channel();
    let renderer = mixer.renderer();
    let audio = thread::spawn(move || {
        let mut out = vec![0i16; 64 * 2];
        let written = renderer.render(&mut out, 2);
        let _ = done_tx.send((written, out));
    });
    let (written, out) = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("render waited on a stream held by its owner");
    audio.join().unwrap();
    assert_eq!(written, 64);
    assert!(out.iter().all(|&s| s == 0));

    // still registered until it can be stopped; the registry stays usable
    assert_eq!(mixer.stream_count(), 1);
    assert_eq!(probe.stops(), 0);

    drop(guard);
    mixer.render(&mut [0i16; 8], 2);
    assert_eq!(mixer.stream_count(), 0);
    assert_eq!(probe.stops(), 1);

    mixer.render(&mut [0i16; 8], 2);
    assert_eq!(probe.stops(), 1);
}

#[test]
fn racing_volume_setters_leave_a_consistent_volume() {
    init_tracing();
    let mixer = Arc::new(AudioManager::new(MixerConfig::default().with_sample_rate(48_000)));
    mixer.add_stream(Stream::new(Constant::new(20_000))).unwrap();

    let setters: Vec<_> = [0.25f32, 0.75]
        .into_iter()
        .map(|volume| {
            let mixer = mixer.clone();
            thread::spawn(move || {
                for _ in 0..2_000 {
                    mixer.set_volume(volume);
                }
            })
        })
        .collect();
    for setter in setters {
        setter.join().unwrap();
    }

    // whichever setter won, what is reported is what gets applied
    let expected = if mixer.volume() == 0.25 { 5_000 } else { 15_000 };
    let mut out = vec![0i16; 2];
    mixer.render(&mut out, 2);
    assert_eq!(out, vec![expected; 2]);
}
