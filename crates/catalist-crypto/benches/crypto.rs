use catalist_crypto::{RecordCipher, SessionKey};

fn make_text(size: usize) -> String {
    (0..size)
        .map(|i| (b'a' + ((i.wrapping_mul(7) ^ (i >> 3)) % 26) as u8) as char)
        .collect()
}

fn test_cipher() -> RecordCipher {
    RecordCipher::with_key(&SessionKey::from_bytes([0xABu8; 32]))
}

#[divan::bench(args = [64, 1024, 65536])]
fn bench_encrypt_field(bencher: divan::Bencher, size: usize) {
    let cipher = test_cipher();
    let text = make_text(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| cipher.encrypt(divan::black_box(&text)).unwrap());
}

#[divan::bench(args = [64, 1024, 65536])]
fn bench_decrypt_field(bencher: divan::Bencher, size: usize) {
    let cipher = test_cipher();
    let envelope = cipher.encrypt(&make_text(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| cipher.decrypt(divan::black_box(&envelope)).unwrap());
}

fn main() {
    divan::main();
}
