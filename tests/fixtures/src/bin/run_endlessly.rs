use std::time::Duration;

fn main() {
    loop {
        std::thread::sleep(Duration::from_millis(100));
    }
}
