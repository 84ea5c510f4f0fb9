fn main() {
    println!("Hello, rdbg!");
}
