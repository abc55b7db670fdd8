use lamellar_hello::hello::{launch, Hello6TaskParDist};

fn main() -> anyhow::Result<()> {
    launch::<Hello6TaskParDist>()
}
