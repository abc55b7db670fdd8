use lamellar_hello::hello::{launch, Hello5TaskPar};

fn main() -> anyhow::Result<()> {
    launch::<Hello5TaskPar>()
}
