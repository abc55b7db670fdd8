use lamellar_hello::hello::{launch, Hello3DataPar};

fn main() -> anyhow::Result<()> {
    launch::<Hello3DataPar>()
}
