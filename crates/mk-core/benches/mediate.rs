//! Per-request hot path: header mediation and URL classification.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mk_core::filter::Blocklist;
use mk_core::headers::mutate_request_headers;
use mk_core::{resolve, GeneralSettings, Header, Mode, ResourceType};

fn request_headers() -> Vec<Header> {
    vec![
        Header::new("Host", "www.example.com"),
        Header::new("User-Agent", "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0"),
        Header::new("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        Header::new("Accept-Language", "de-DE,de;q=0.8,en-US;q=0.5,en;q=0.3"),
        Header::new("Accept-Encoding", "gzip, deflate, br"),
        Header::new("Connection", "keep-alive"),
        Header::new("Cookie", "session=abc123"),
    ]
}

fn bench_headers(c: &mut Criterion) {
    let config = resolve(Mode::Aggressive, &GeneralSettings::default());
    let headers = request_headers();

    c.bench_function("mutate_request_headers", |b| {
        b.iter(|| mutate_request_headers(black_box(&config), "https://www.example.com/", headers.clone()))
    });
}

fn bench_classify(c: &mut Criterion) {
    let blocklist = Blocklist::compile(&resolve(Mode::Aggressive, &GeneralSettings::default()));

    c.bench_function("classify_blocked_image", |b| {
        b.iter(|| blocklist.classify(black_box("https://stats.g.doubleclick.net/pixel.gif?x=1"), ResourceType::IMAGE))
    });
    c.bench_function("classify_allowed_script", |b| {
        b.iter(|| blocklist.classify(black_box("https://cdn.example.com/app.js"), ResourceType::SCRIPT))
    });
}

criterion_group!(benches, bench_headers, bench_classify);
criterion_main!(benches);
