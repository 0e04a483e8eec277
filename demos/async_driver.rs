//! Driving a guarded page from async code via the worker-thread driver.
//! Run with: cargo run --example async_driver

use playguard::media::KeyPress;
use playguard::sim::VideoSpec;
use playguard::GuardDriver;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let driver = GuardDriver::new(None).await?;
    let video = driver.append_video(VideoSpec::playing_main()).await?;

    driver
        .on_resume(|record| {
            println!("resume @{}ms {} ({:?})", record.at_ms, record.video, record.reason);
        })
        .await?;

    driver.press_key(KeyPress::bare("i")).await?;
    driver.call_pause(video).await?;
    let now = driver.advance(500).await?;

    println!(
        "t={}ms, paused = {}, {} resume(s) recorded",
        now,
        driver.is_paused(video).await?,
        driver.resume_log().await?.len()
    );

    println!("{}", driver.trace_json().await?);
    driver.close().await?;
    Ok(())
}
