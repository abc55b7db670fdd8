use lamellar_hello::hello::{launch, Hello4DataParDist};

fn main() -> anyhow::Result<()> {
    launch::<Hello4DataParDist>()
}
