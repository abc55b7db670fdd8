use lamellar_hello::hello::{launch, Hello};

fn main() -> anyhow::Result<()> {
    launch::<Hello>()
}
