//! Forced deleveraging example.
//!
//! The admin tightens `max_leverage` below the long side's leverage. The
//! next accrual hands the most leveraged long to the shorts: their base
//! debt is settled with its collateral and its quote debt comes out of
//! their quote collateral.

use margin_engine::core::fixed_point::Fp96;
use margin_engine::prelude::*;

fn print_side(pool: &MarginlyPool, who: &AccountId) {
    println!(
        "  {:<8} {:<6} base +{} -{}  quote +{} -{}",
        who.as_str(),
        pool.position_type(who).to_string(),
        pool.real_collateral_of(who, Token::Base).unwrap(),
        pool.real_debt_of(who, Token::Base).unwrap(),
        pool.real_collateral_of(who, Token::Quote).unwrap(),
        pool.real_debt_of(who, Token::Quote).unwrap()
    );
}

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  margin-engine: Deleveraging Example     ║");
    println!("╚══════════════════════════════════════════╝\n");

    let admin = AccountId::new("admin");
    let shorter = AccountId::new("shorter");
    let longer = AccountId::new("longer");
    let lender = AccountId::new("lender");
    let accounts = [&shorter, &longer, &lender];

    let mut pool = MarginlyPool::new(admin.clone(), MarginlyParams::default(), Fp96::ONE, 0).unwrap();
    let mut venue = SimulatedVenue::new(Fp96::ONE, 0);
    venue.mint(&shorter, Token::Quote, 13_000);
    venue.mint(&longer, Token::Base, 1_000);
    venue.mint(&lender, Token::Base, 2_000);

    venue.execute(&mut pool, &shorter, Call::deposit_quote(13_000)).unwrap();
    let long = Call::DepositBase {
        amount: 1_000,
        long_amount: 9_000,
        wrap_native: false,
        beneficiary: None,
    };
    venue.execute(&mut pool, &longer, long).unwrap();
    venue.execute(&mut pool, &lender, Call::deposit_base(2_000)).unwrap();
    venue.execute(&mut pool, &shorter, Call::Short { amount: 12_000 }).unwrap();

    println!("━━━ Before ━━━\n");
    for who in accounts {
        print_side(&pool, who);
    }
    let leverage = pool.system_leverage();
    println!(
        "\n  System leverage: short {:.2}  long {:.2}\n",
        leverage.short_x96.to_f64(),
        leverage.long_x96.to_f64()
    );

    let params = MarginlyParams {
        max_leverage: 3,
        ..MarginlyParams::default()
    };
    venue.execute(&mut pool, &admin, Call::SetParameters { params }).unwrap();
    venue.advance(1);
    let receipt = venue.execute(&mut pool, &lender, Call::Reinit).unwrap();

    println!("━━━ After max_leverage = 3 ━━━\n");
    for who in &receipt.deleveraged {
        println!("  deleveraged: {}", who);
    }
    println!();
    for who in accounts {
        print_side(&pool, who);
    }
    println!("\n{}", pool.snapshot().unwrap());
}
