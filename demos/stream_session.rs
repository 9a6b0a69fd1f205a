//! Drive a short synthetic squat session and print each snapshot

use chrono::{Duration, TimeZone, Utc};
use smartorb_engine::{
    EngineConfig, IntensityTier, SensorSample, SessionManager, SessionRequest, UserProfile,
};

fn main() {
    let mut manager = SessionManager::new(EngineConfig::default());
    let mut profile = UserProfile::new(60.0, 190.0);
    profile.weight_kg = Some(75.0);
    manager.set_profile(profile);

    let request = SessionRequest::new()
        .with_exercise("squat")
        .with_intensity(IntensityTier::Moderate);
    if let Err(e) = manager.start(request) {
        eprintln!("Error: {e}");
        return;
    }
    if let Err(e) = manager.toggle_stimulation(true) {
        eprintln!("Error: {e}");
        return;
    }

    let Some(origin) = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).single() else {
        return;
    };
    for second in 0..120i64 {
        // One rep every four seconds: dip below zero, then drive up past 2 m/s².
        let accel_z = match second % 4 {
            0 => -1.0,
            1 => 3.0,
            _ => 0.5,
        };
        let heart_rate = 80.0 + second as f64 * 0.5;
        let sample = SensorSample::at(origin + Duration::seconds(second))
            .with_heart_rate(heart_rate)
            .with_acceleration(0.2, 0.1, accel_z)
            .with_emg(0.4)
            .with_power(180.0);

        match manager.process_sample(sample) {
            Ok(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            Err(e) => {
                eprintln!("Error: {e}");
                return;
            }
        }
    }

    match manager.end().map(|summary| summary.to_json()) {
        Ok(Ok(json)) => println!("{json}"),
        Ok(Err(e)) => eprintln!("Error: {e}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
