use lamellar_hello::hello::{launch, Hello2Module};

fn main() -> anyhow::Result<()> {
    launch::<Hello2Module>()
}
