use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const METRICS: [&str; 5] = ["pm25", "pm10", "co2", "temperature", "humidity"];

fn random_value(metric: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    match metric {
        "pm25" => format!("{:.1}", rng.gen_range(5.0..100.0)),
        "pm10" => format!("{:.1}", rng.gen_range(15.0..120.0)),
        "co2" => rng.gen_range(400..2000).to_string(),
        "temperature" => format!("{:.1}", rng.gen_range(18.0..32.0)),
        _ => format!("{:.1}", rng.gen_range(30.0..80.0)),
    }
}

/// Needs a broker on localhost:1883 and a running ingestor subscribed to
/// `loadtest/#`.
#[tokio::test]
#[ignore]
async fn test_1000_metric_messages_per_second() {
    let test_duration_secs = 10;
    let target_rate = 1000;
    let total_messages = test_duration_secs * target_rate;

    let mut mqtt_options = MqttOptions::new("airq-load-test", "localhost", 1883);
    mqtt_options.set_keep_alive(Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 20000);

    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                eprintln!("MQTT error: {}", e);
                break;
            }
        }
    });

    sleep(Duration::from_millis(500)).await;

    let start = Instant::now();
    let mut sent_count = 0;
    let mut error_count = 0;

    let burst_size = 100;
    let delay_per_burst = Duration::from_micros((burst_size * 1_000_000) / target_rate as u64);

    for batch_start in (0..total_messages).step_by(burst_size as usize) {
        for i in batch_start..std::cmp::min(batch_start + burst_size as usize, total_messages) {
            let metric = METRICS[i % METRICS.len()];
            let topic = format!("loadtest/air_monitor_{:03}/{}", i % 10, metric);

            match client
                .publish(topic, QoS::AtLeastOnce, false, random_value(metric))
                .await
            {
                Ok(_) => sent_count += 1,
                Err(e) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Send error: {}", e);
                    }
                }
            }
        }

        sleep(delay_per_burst).await;
    }

    let duration = start.elapsed();
    let actual_rate = sent_count as f64 / duration.as_secs_f64();
    println!(
        "Sent {} messages in {:.2}s ({:.0} msg/s), {} errors",
        sent_count,
        duration.as_secs_f64(),
        actual_rate,
        error_count
    );

    assert!(
        actual_rate >= 900.0,
        "Throughput too low: {:.2} msg/s (expected >= 900)",
        actual_rate
    );
    assert_eq!(error_count, 0, "Publish errors: {}", error_count);
}
